//! Contract Test: Rotation Order
//!
//! Constraints verified:
//! - N cycles over N addresses visit each once, in list order
//! - Cycle N+1 wraps to the first address
//! - An empty list fails before the applier is called
//! - The advance policy decides whether a failed address is retried
//! - A failed notification counts as a failed cycle for the advance policy

mod common;

use common::*;
use dnsrot_core::{
    AdvancePolicy, Error, RotationController, RotationEvent, RotationState, Trigger,
};

#[tokio::test]
async fn cycles_visit_every_address_in_order_then_wrap() {
    let addresses = ["1.1.1.1", "1.0.0.1", "9.9.9.9", "8.8.8.8"];
    let applier = ScriptedApplier::new();
    let recorder = ScriptedApplier::sharing_state_with(&applier);
    let config = test_config(&addresses, false);

    let (controller, _events) =
        RotationController::new(Box::new(applier), Box::new(RecordingNotifier::new()), &config);
    let mut state = RotationState::new(config.dns_addresses.clone());

    for _ in 0..=addresses.len() {
        controller
            .run_cycle(&mut state, Trigger::Timer)
            .await
            .expect("cycle succeeds");
    }

    let mut expected: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
    expected.push("1.1.1.1".to_string());
    assert_eq!(recorder.calls(), expected);
}

#[tokio::test]
async fn empty_address_list_issues_no_commands() {
    let applier = ScriptedApplier::new();
    let recorder = ScriptedApplier::sharing_state_with(&applier);
    let config = test_config(&[], true);

    let (controller, _events) =
        RotationController::new(Box::new(applier), Box::new(RecordingNotifier::new()), &config);

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), controller.run())
        .await
        .expect("controller stops on its own");

    assert!(
        matches!(result, Err(Error::NoAddressesConfigured)),
        "got {result:?}"
    );
    assert_eq!(recorder.call_count(), 0);
}

#[tokio::test]
async fn skip_forward_does_not_retry_a_failed_address() {
    let applier = ScriptedApplier::new().fail_on("a");
    let recorder = ScriptedApplier::sharing_state_with(&applier);
    let config = test_config(&["a", "b", "c"], false);

    let (controller, _events) =
        RotationController::new(Box::new(applier), Box::new(RecordingNotifier::new()), &config);
    let mut state = RotationState::new(config.dns_addresses.clone());

    assert!(controller.run_cycle(&mut state, Trigger::Timer).await.is_err());
    assert_eq!(state.index(), 1, "failed slot is consumed");

    controller.run_cycle(&mut state, Trigger::Timer).await.unwrap();
    assert_eq!(recorder.calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn retry_same_keeps_the_cursor_on_failure() {
    let applier = ScriptedApplier::new().fail_on("a");
    let recorder = ScriptedApplier::sharing_state_with(&applier);
    let mut config = test_config(&["a", "b"], false);
    config.advance_policy = AdvancePolicy::RetrySame;

    let (controller, _events) =
        RotationController::new(Box::new(applier), Box::new(RecordingNotifier::new()), &config);
    let mut state = RotationState::new(config.dns_addresses.clone());

    for _ in 0..2 {
        let err = controller.run_cycle(&mut state, Trigger::Timer).await.unwrap_err();
        assert!(matches!(err, Error::PartialApply(_)), "got {err:?}");
        assert_eq!(state.index(), 0);
    }
    assert_eq!(recorder.calls(), vec!["a", "a"]);
}

#[tokio::test]
async fn retry_same_keeps_the_cursor_when_notification_fails() {
    let applier = ScriptedApplier::new();
    let recorder = ScriptedApplier::sharing_state_with(&applier);
    let mut config = test_config(&["a", "b"], true);
    config.advance_policy = AdvancePolicy::RetrySame;

    let (controller, _events) = RotationController::new(
        Box::new(applier),
        Box::new(RecordingNotifier::new().failing()),
        &config,
    );
    let mut state = RotationState::new(config.dns_addresses.clone());

    for _ in 0..2 {
        let err = controller.run_cycle(&mut state, Trigger::Timer).await.unwrap_err();
        assert!(matches!(err, Error::Notification(_)), "got {err:?}");
        assert_eq!(state.index(), 0, "cursor only moves after a full success");
    }
    assert_eq!(recorder.calls(), vec!["a", "a"]);
}

#[tokio::test]
async fn loop_rotates_on_start_and_on_each_change_request() {
    let applier = ScriptedApplier::new();
    let recorder = ScriptedApplier::sharing_state_with(&applier);
    let notifier = RecordingNotifier::new();
    let config = test_config(&["1.1.1.1", "1.0.0.1", "9.9.9.9"], true);

    let (controller, mut events) =
        RotationController::new(Box::new(applier), Box::new(notifier.clone()), &config);
    let handle = controller.handle();
    let task = tokio::spawn(controller.run());

    // The first tick fires immediately
    wait_for_event(&mut events, |e| matches!(e, RotationEvent::CycleSucceeded { .. })).await;

    for _ in 0..2 {
        assert!(handle.request_change());
        wait_for_event(&mut events, |e| {
            matches!(
                e,
                RotationEvent::CycleSucceeded {
                    trigger: Trigger::Manual,
                    ..
                }
            )
        })
        .await;
    }

    handle.request_quit();
    task.await.unwrap().unwrap();

    assert_eq!(recorder.calls(), vec!["1.1.1.1", "1.0.0.1", "9.9.9.9"]);
    let bodies: Vec<String> = notifier.notifications().into_iter().map(|(_, b)| b).collect();
    assert_eq!(
        bodies,
        vec![
            "DNS has been changed to 1.1.1.1",
            "DNS has been changed to 1.0.0.1",
            "DNS has been changed to 9.9.9.9",
        ]
    );
}
