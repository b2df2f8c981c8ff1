//! Run-on-startup registration
//!
//! Registration overwrites any existing entry, so running it on every launch
//! leaves exactly one entry pointing at the current executable.

use crate::PlatformStrategy;
use crate::windows::ps_quote;
use dnsrot_core::{CommandRunner, CommandSpec, Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the autostart entry
pub const AUTOSTART_NAME: &str = "DNSChanger";

const RUN_KEY: &str = r"HKCU:\Software\Microsoft\Windows\CurrentVersion\Run";

/// Where the autostart entry was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutostartEntry {
    /// XDG desktop entry
    DesktopFile(PathBuf),
    /// Value under the per-user Run key
    RegistryValue { key: String, name: String },
}

/// Registers an executable to start with the user session
#[derive(Debug, Clone)]
pub struct Autostart {
    strategy: PlatformStrategy,
    exe: PathBuf,
    autostart_dir: Option<PathBuf>,
}

impl Autostart {
    pub fn new(strategy: PlatformStrategy, exe: impl Into<PathBuf>) -> Self {
        Self {
            strategy,
            exe: exe.into(),
            autostart_dir: None,
        }
    }

    /// Register the running executable
    pub fn for_current_exe(strategy: PlatformStrategy) -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| Error::autostart(format!("failed to get executable path: {e}")))?;
        Ok(Self::new(strategy, exe))
    }

    /// Write desktop entries into `dir` instead of `~/.config/autostart`
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.autostart_dir = Some(dir.into());
        self
    }

    /// Create or overwrite the autostart entry
    pub async fn register(&self, runner: &dyn CommandRunner) -> Result<AutostartEntry> {
        match &self.strategy {
            PlatformStrategy::Windows => self.register_run_key(runner).await,
            PlatformStrategy::Linux | PlatformStrategy::MacOs => self.write_desktop_file().await,
            PlatformStrategy::Unsupported(os) => Err(Error::unsupported_platform(os)),
        }
    }

    fn autostart_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.autostart_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".config").join("autostart"))
            .ok_or_else(|| Error::autostart("could not determine home directory"))
    }

    async fn write_desktop_file(&self) -> Result<AutostartEntry> {
        let dir = self.autostart_dir()?;
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::autostart(format!(
                "failed to create autostart directory {}: {e}",
                dir.display()
            ))
        })?;

        let path = dir.join(format!("{AUTOSTART_NAME}.desktop"));
        tokio::fs::write(&path, desktop_entry(&self.exe))
            .await
            .map_err(|e| {
                Error::autostart(format!("failed to write {}: {e}", path.display()))
            })?;

        info!(path = %path.display(), "Registered run on startup");
        Ok(AutostartEntry::DesktopFile(path))
    }

    async fn register_run_key(&self, runner: &dyn CommandRunner) -> Result<AutostartEntry> {
        let script = run_key_script(&self.exe);
        let command = CommandSpec::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(script);

        let out = runner.run(&command).await?;
        if !out.is_success() {
            return Err(Error::autostart(format!(
                "registry update failed with {}. Output: {}",
                out.status(),
                out.output.trim_end()
            )));
        }

        info!(key = RUN_KEY, name = AUTOSTART_NAME, "Registered run on startup");
        Ok(AutostartEntry::RegistryValue {
            key: RUN_KEY.to_string(),
            name: AUTOSTART_NAME.to_string(),
        })
    }
}

fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Exec={}\n\
         Hidden=false\n\
         NoDisplay=false\n\
         X-GNOME-Autostart-enabled=true\n\
         Name={AUTOSTART_NAME}\n\
         Comment=Start {AUTOSTART_NAME} on startup\n",
        exe.display()
    )
}

fn run_key_script(exe: &Path) -> String {
    let path = ps_quote(RUN_KEY);
    let name = ps_quote(AUTOSTART_NAME);
    let value = ps_quote(&exe.display().to_string());
    format!(
        "if (Get-ItemProperty -Path {path} -Name {name} -ErrorAction SilentlyContinue) {{ \
         Set-ItemProperty -Path {path} -Name {name} -Value {value} \
         }} else {{ \
         New-ItemProperty -Path {path} -Name {name} -Value {value} -PropertyType String \
         }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use dnsrot_core::CommandOutput;

    #[tokio::test]
    async fn registering_twice_leaves_one_identical_entry() {
        let dir = tempfile::tempdir().unwrap();
        let autostart_dir = dir.path().join("autostart");
        let runner = ScriptedRunner::new([]);
        let autostart = Autostart::new(PlatformStrategy::Linux, "/usr/local/bin/dnsrotd")
            .with_dir(&autostart_dir);

        let first = autostart.register(&runner).await.unwrap();
        let content = std::fs::read_to_string(autostart_dir.join("DNSChanger.desktop")).unwrap();
        let second = autostart.register(&runner).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(&autostart_dir).unwrap().count(), 1);
        assert_eq!(
            std::fs::read_to_string(autostart_dir.join("DNSChanger.desktop")).unwrap(),
            content
        );
        assert!(content.contains("Exec=/usr/local/bin/dnsrotd\n"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn stale_entry_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("DNSChanger.desktop"),
            "[Desktop Entry]\nExec=/old\n",
        )
        .unwrap();

        let autostart =
            Autostart::new(PlatformStrategy::MacOs, "/opt/dnsrotd").with_dir(dir.path());
        autostart.register(&ScriptedRunner::new([])).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("DNSChanger.desktop")).unwrap();
        assert!(content.contains("Exec=/opt/dnsrotd\n"));
        assert!(!content.contains("/old"));
    }

    #[tokio::test]
    async fn windows_updates_run_key_in_place() {
        let runner = ScriptedRunner::new([Ok(CommandOutput::success(""))]);
        let autostart = Autostart::new(
            PlatformStrategy::Windows,
            r"C:\Program Files\dnsrot\dnsrotd.exe",
        );

        let entry = autostart.register(&runner).await.unwrap();
        assert_eq!(
            entry,
            AutostartEntry::RegistryValue {
                key: RUN_KEY.to_string(),
                name: "DNSChanger".to_string(),
            }
        );

        let script = runner.calls()[0].args.last().unwrap().clone();
        assert!(script.contains("Set-ItemProperty"));
        assert!(script.contains("New-ItemProperty"));
        assert!(script.contains(r"'C:\Program Files\dnsrot\dnsrotd.exe'"));
    }

    #[tokio::test]
    async fn windows_registry_failure_is_reported() {
        let runner = ScriptedRunner::new([Ok(CommandOutput::failure(1, "Access denied"))]);
        let autostart = Autostart::new(PlatformStrategy::Windows, r"C:\dnsrotd.exe");

        let err = autostart.register(&runner).await.unwrap_err();
        assert!(matches!(err, Error::Autostart(_)));
        assert!(err.to_string().contains("Access denied"));
    }
}
