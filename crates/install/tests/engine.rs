//! Install operation state machine

mod support;

use lspkg_errors::{Error, PackageManagerError};
use lspkg_events::{AppEvent, InstallEvent};
use lspkg_install::{InstallContext, InstallOperation, InstallStep, RunningState, StepConfirmation};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use support::{operation, run_confirming, Reply, ScriptedShell};

fn counting_step(
    name: &str,
    confirmation: StepConfirmation,
    counter: &Arc<AtomicUsize>,
) -> InstallStep {
    let counter = Arc::clone(counter);
    InstallStep::new(name, confirmation, move |ctx: InstallContext| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.status("working");
            Ok::<(), Error>(())
        }
    })
}

fn quiet_shell() -> Arc<ScriptedShell> {
    ScriptedShell::new(|_| Reply::lines(&[]))
}

#[tokio::test]
async fn test_steps_run_in_order_to_completion() {
    let counter = Arc::new(AtomicUsize::new(0));
    let steps = vec![
        counting_step("First", StepConfirmation::None, &counter),
        counting_step("Second", StepConfirmation::None, &counter),
    ];
    let op = operation(steps, quiet_shell());
    assert_eq!(op.running_state(), RunningState::NotStarted);
    assert!(op.current_step().is_none());

    op.run().await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(op.running_state(), RunningState::Complete);
    assert!(op.error().is_none());
    assert!((op.progress() - 1.0).abs() < f64::EPSILON);

    let output = op.accumulated_output();
    let rendered: Vec<(&str, bool)> = output
        .iter()
        .map(|l| (l.content.as_str(), l.is_step_divider))
        .collect();
    assert_eq!(
        rendered,
        [("First", true), ("working", false), ("Second", true), ("working", false)]
    );
}

#[tokio::test]
async fn test_operation_runs_once() {
    let op = operation(vec![InstallStep::noop()], quiet_shell());
    op.run().await.unwrap();
    assert!(matches!(op.run().await, Err(Error::Internal(_))));
}

#[tokio::test]
async fn test_confirmation_gate_holds_handler() {
    let counter = Arc::new(AtomicUsize::new(0));
    let op = operation(
        vec![counting_step("Gated", StepConfirmation::Required("Allow?".into()), &counter)],
        quiet_shell(),
    );
    assert!(op.confirm().is_err());

    let runner = {
        let op = op.clone();
        tokio::spawn(async move { op.run().await })
    };

    let mut updates = op.subscribe();
    updates
        .wait_for(|s| s.waiting_for_confirmation.is_some())
        .await
        .unwrap();
    assert_eq!(op.waiting_for_confirmation().as_deref(), Some("Allow?"));
    assert_eq!(op.running_state(), RunningState::Running);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    op.confirm().unwrap();
    runner.await.unwrap().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(op.waiting_for_confirmation().is_none());
    assert_eq!(op.running_state(), RunningState::Complete);
}

#[tokio::test]
async fn test_cancel_at_gate_leaves_handler_uninvoked() {
    let counter = Arc::new(AtomicUsize::new(0));
    let op = operation(
        vec![
            counting_step("Free", StepConfirmation::None, &counter),
            counting_step("Gated", StepConfirmation::Required("Allow?".into()), &counter),
        ],
        quiet_shell(),
    );

    let runner = {
        let op = op.clone();
        tokio::spawn(async move { op.run().await })
    };
    op.subscribe()
        .wait_for(|s| s.waiting_for_confirmation.is_some())
        .await
        .unwrap();

    op.cancel();
    let result = runner.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(op.error().is_none());
    assert!(op.waiting_for_confirmation().is_none());
    assert!(op.is_cancelled());
    assert!(op.confirm().is_err());
}

#[tokio::test]
async fn test_failure_is_captured_and_halts() {
    let counter = Arc::new(AtomicUsize::new(0));
    let failing = InstallStep::failing(
        "Broken",
        PackageManagerError::InstallationFailed {
            reason: "Source build failed.".into(),
            detail: Some("make: *** [all] Error 2".into()),
        }
        .into(),
    );
    let (tx, mut rx) = lspkg_events::channel();
    let package =
        support::item(r#"{"name": "demo-ls", "source": {"id": "pkg:npm/demo-ls@1.0.0"}}"#);
    let op = InstallOperation::with_event_sender(
        package,
        vec![failing, counting_step("After", StepConfirmation::None, &counter)],
        quiet_shell(),
        Some(tx),
    );

    let err = op.run().await.unwrap_err();
    assert!(matches!(err, Error::PackageManager(PackageManagerError::InstallationFailed { .. })));
    assert_eq!(op.running_state(), RunningState::Running);
    assert!(op.error().is_some());
    assert_eq!(op.current_step().map(|s| s.name.as_str()), Some("Broken"));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let mut failed = None;
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::Install(InstallEvent::OperationFailed { details, failure, .. }) = event {
            failed = Some((details, failure));
        }
    }
    let (details, failure) = failed.expect("operation failed event");
    assert_eq!(details.as_deref(), Some("make: *** [all] Error 2"));
    assert_eq!(failure.reason.as_deref(), Some("Source build failed."));
}

#[tokio::test]
async fn test_cancel_mid_step_drops_running_command() {
    let shell = ScriptedShell::new(|cmd| {
        if cmd.to_string().starts_with("sleep") {
            Reply::Hang
        } else {
            Reply::lines(&[])
        }
    });
    let step = InstallStep::new("Slow", StepConfirmation::None, |ctx: InstallContext| async move {
        ctx.run_command("sleep 600").await?;
        Ok::<(), Error>(())
    });
    let op = operation(vec![step], shell.clone());

    let runner = {
        let op = op.clone();
        tokio::spawn(async move { op.run().await })
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while shell.calls().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    op.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(op.error().is_none());
}

#[tokio::test]
async fn test_run_confirming_helper_drives_gates() {
    let counter = Arc::new(AtomicUsize::new(0));
    let op = operation(
        vec![
            counting_step("One", StepConfirmation::Required("first?".into()), &counter),
            counting_step("Two", StepConfirmation::Required("second?".into()), &counter),
        ],
        quiet_shell(),
    );
    run_confirming(&op).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
