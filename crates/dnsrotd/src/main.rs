// # dnsrotd - DNS rotation daemon
//
// Thin integration layer: all rotation logic lives in dnsrot-core and all OS
// commands in dnsrot-platform. This binary:
// 1. Checks the OS is supported and the process is privileged
// 2. Loads (or creates) the YAML configuration
// 3. Registers autostart and builds the applier for this OS
// 4. Runs the rotation controller until quit or a fail-stop failure
//
// ## Configuration
//
// - `DNSROT_CONFIG`: Path to the YAML config file (default `config.yaml`,
//   created with defaults if missing)
// - `DNSROT_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
//
// ## Signals
//
// The process has no tray icon of its own; the desktop shell talks to it
// with signals:
// - `SIGUSR1`: change DNS now
// - `SIGINT` / `SIGTERM`: quit
//
// ## Example
//
// ```bash
// sudo DNSROT_CONFIG=/etc/dnsrot/config.yaml dnsrotd
// sudo kill -USR1 $(pidof dnsrotd)
// ```

use anyhow::{Context, Result};
use clap::Parser;
use dnsrot_core::config::DEFAULT_COMMAND_TIMEOUT_SECS;
use dnsrot_core::{
    CommandRunner, ConfigFile, ControllerHandle, Error, LogNotifier, Notifier,
    RotationConfig, RotationController, RotationEvent, StopReason,
};
use dnsrot_platform::{
    Autostart, DesktopNotifier, PlatformStrategy, TokioCommandRunner, check_privileges,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const APP_TITLE: &str = "DNS Changer";
const APP_TOOLTIP: &str = "DNS Changer running";

/// Rotation interval in diagnostic mode
const DEBUG_INTERVAL: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// - 0: Quit requested
/// - 1: Configuration or startup error
/// - 2: A rotation cycle failed and the controller stopped
#[derive(Debug, Clone, Copy)]
enum DnsrotExitCode {
    /// Clean shutdown (normal exit)
    Quit = 0,
    /// Configuration error or startup failure
    StartupError = 1,
    /// Rotation failure under the fail-stop policy
    RotationError = 2,
}

impl From<DnsrotExitCode> for ExitCode {
    fn from(code: DnsrotExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "dnsrotd", version, about = "Rotates the system DNS resolver")]
struct Cli {
    /// Rotate every 10 seconds and log at debug level
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let log_level = match env::var("DNSROT_LOG_LEVEL")
        .unwrap_or_else(|_| default_level.to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsrotExitCode::StartupError.into();
    }

    info!(title = APP_TITLE, tooltip = APP_TOOLTIP, "Starting dnsrotd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsrotExitCode::StartupError.into();
        }
    };

    let config_path = env::var("DNSROT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    rt.block_on(run_daemon(cli, ConfigFile::new(config_path))).into()
}

/// Run the startup gate, then the controller
async fn run_daemon(cli: Cli, config_file: ConfigFile) -> DnsrotExitCode {
    let strategy = PlatformStrategy::detect();
    let shutdown = CancellationToken::new();

    // The command deadline is configurable, so the gate runs with the default
    let gate_runner = TokioCommandRunner::new(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS))
        .with_cancellation(shutdown.clone());
    let config = match load_config_after_gate(&strategy, &gate_runner, &config_file).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return DnsrotExitCode::StartupError;
        }
    };
    info!(
        path = %config_file.path().display(),
        addresses = config.dns_addresses.len(),
        interval_hours = config.change_interval_hours,
        "Configuration loaded"
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(
        TokioCommandRunner::new(config.command_timeout()).with_cancellation(shutdown.clone()),
    );

    if config.run_on_startup
        && let Err(e) = register_autostart(&strategy, runner.as_ref()).await
    {
        error!("Startup failed: {:#}", e);
        return DnsrotExitCode::StartupError;
    }

    let applier = strategy.create_applier(&config, runner.clone());

    if strategy == PlatformStrategy::Windows {
        match applier.active_targets().await {
            Ok(adapters) => info!(?adapters, "Active network interfaces"),
            Err(e) => {
                error!("Failed to get network interfaces: {}", e);
                return DnsrotExitCode::StartupError;
            }
        }
    }

    let notifier: Box<dyn Notifier> = if has_desktop_session(&strategy) {
        Box::new(DesktopNotifier::new(APP_TITLE))
    } else {
        warn!("No desktop session found, notifications go to the log only");
        Box::new(LogNotifier)
    };
    let (controller, events) = RotationController::new(applier, notifier, &config);
    let mut controller = controller.with_cancellation(shutdown);
    if cli.debug {
        info!(interval = ?DEBUG_INTERVAL, "Debug mode, using short rotation interval");
        controller = controller.with_tick_interval(DEBUG_INTERVAL);
    }

    tokio::spawn(log_events(events));

    let handle = controller.handle();
    let signals = match spawn_signal_bridge(handle) {
        Ok(task) => task,
        Err(e) => {
            error!("Failed to install signal handlers: {:#}", e);
            return DnsrotExitCode::StartupError;
        }
    };

    let result = controller.run().await;
    signals.abort();

    match result {
        Ok(StopReason::Quit) => {
            info!("Shutting down dnsrotd");
            DnsrotExitCode::Quit
        }
        Err(e) => {
            error!("Rotation stopped: {}", e);
            DnsrotExitCode::RotationError
        }
    }
}

/// Refuse to start unless this host can be rotated, then load the config
///
/// Nothing is written to disk before the privilege check passes.
async fn load_config_after_gate(
    strategy: &PlatformStrategy,
    runner: &dyn CommandRunner,
    config_file: &ConfigFile,
) -> Result<RotationConfig> {
    if !strategy.is_supported() {
        return Err(Error::unsupported_platform(strategy.os_name()).into());
    }

    check_privileges(strategy, runner).await?;

    config_file
        .load_or_create()
        .context("failed to load configuration")
}

async fn register_autostart(strategy: &PlatformStrategy, runner: &dyn CommandRunner) -> Result<()> {
    let entry = Autostart::for_current_exe(strategy.clone())?
        .register(runner)
        .await?;
    debug!(?entry, "Autostart entry written");
    Ok(())
}

/// Linux daemons started outside a session have no notification server
fn has_desktop_session(strategy: &PlatformStrategy) -> bool {
    match strategy {
        PlatformStrategy::Linux => ["DISPLAY", "WAYLAND_DISPLAY", "DBUS_SESSION_BUS_ADDRESS"]
            .iter()
            .any(|var| env::var_os(var).is_some()),
        _ => true,
    }
}

/// Drain controller events into the log
async fn log_events(mut events: mpsc::Receiver<RotationEvent>) {
    while let Some(event) = events.recv().await {
        match &event {
            RotationEvent::TicksDropped { count } => {
                warn!(count, "Rotation ticks lost while a change was running")
            }
            _ => debug!(?event, "Controller event"),
        }
    }
}

/// Forward OS signals to the controller
///
/// Signal handlers are installed before returning so that a failure is a
/// startup error rather than a silent missing control path.
#[cfg(unix)]
fn spawn_signal_bridge(handle: ControllerHandle) -> Result<tokio::task::JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sigusr1 =
        signal(SignalKind::user_defined1()).context("Failed to setup SIGUSR1 handler")?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    handle.request_quit();
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    handle.request_quit();
                    break;
                }
                _ = sigusr1.recv() => {
                    info!("Received SIGUSR1, changing DNS");
                    handle.request_change();
                }
            }
        }
    }))
}

/// Forward CTRL-C to the controller
///
/// Fallback implementation for non-Unix platforms; there is no change signal.
#[cfg(not(unix))]
fn spawn_signal_bridge(handle: ControllerHandle) -> Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received CTRL-C");
                handle.request_quit();
            }
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dnsrot_core::{CommandOutput, CommandSpec};

    /// Answers `net session` like an elevated or a plain shell
    struct NetSession {
        elevated: bool,
    }

    #[async_trait]
    impl CommandRunner for NetSession {
        async fn run(&self, _command: &CommandSpec) -> dnsrot_core::Result<CommandOutput> {
            if self.elevated {
                Ok(CommandOutput::success("There are no entries in the list."))
            } else {
                Ok(CommandOutput::failure(2, "System error 5 has occurred.\r\nAccess is denied."))
            }
        }
    }

    #[tokio::test]
    async fn unprivileged_start_writes_no_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let err = load_config_after_gate(
            &PlatformStrategy::Windows,
            &NetSession { elevated: false },
            &ConfigFile::new(&path),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("administrator"), "{err:#}");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unsupported_os_writes_no_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let result = load_config_after_gate(
            &PlatformStrategy::Unsupported("plan9".to_string()),
            &NetSession { elevated: true },
            &ConfigFile::new(&path),
        )
        .await;

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn privileged_start_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = load_config_after_gate(
            &PlatformStrategy::Windows,
            &NetSession { elevated: true },
            &ConfigFile::new(&path),
        )
        .await
        .unwrap();

        assert_eq!(config, RotationConfig::default());
        assert!(path.exists());
    }
}
