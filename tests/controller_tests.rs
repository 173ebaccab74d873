use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use temp_notifier::{
    IterationOutcome, MonitorConfig, MonitorError, Notifier, RetryPolicy, RunController,
    RunLock, RunState, SendError, TemperatureSensor, ThresholdRule, SHUTDOWN_MESSAGE,
};
use tokio_util::sync::CancellationToken;

/// Replays a fixed list of readings. Once the script runs out it requests
/// cancellation and reports a read error.
struct ScriptedSensor {
    script: VecDeque<Option<f32>>,
    cancel: CancellationToken,
}

impl ScriptedSensor {
    fn new(script: &[Option<f32>], cancel: CancellationToken) -> Self {
        Self {
            script: script.iter().copied().collect(),
            cancel,
        }
    }

    fn readings(values: &[f32], cancel: CancellationToken) -> Self {
        let script: Vec<Option<f32>> = values.iter().copied().map(Some).collect();
        Self::new(&script, cancel)
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn source(&self) -> &'static str {
        "scripted"
    }

    async fn read(&mut self, device: &str) -> temp_notifier::Result<f32> {
        match self.script.pop_front() {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(MonitorError::read_error(device, "sensor unavailable")),
            None => {
                self.cancel.cancel();
                Err(MonitorError::read_error(device, "script exhausted"))
            }
        }
    }
}

/// Records delivered messages; fails the first `fail_first` sends.
#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    fail_first: usize,
    attempts: Arc<Mutex<usize>>,
}

impl RecordingNotifier {
    fn failing(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if attempt <= self.fail_first {
            return Err(SendError::HttpStatus(503));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn test_config(lock_dir: &Path, interval: Option<Duration>) -> MonitorConfig {
    let mut config = MonitorConfig::from_toml_str(
        r#"
        [telegram]
        bot_token = "123:abc"
        chat_id = "42"

        [[thresholds]]
        limit = 80.0
        message = "hot"

        [[thresholds]]
        limit = 60.0
        message = "warm"
        "#,
        "device1",
        lock_dir,
    )
    .unwrap();
    config.lock_dir = lock_dir.to_path_buf();
    config.with_interval(interval)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        attempt_timeout: Duration::from_millis(200),
        initial_backoff: Duration::from_millis(1),
    }
}

/// Test the reference reading sequence end to end in continuous mode
#[tokio::test]
async fn test_reference_sequence_continuous() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), Some(Duration::from_millis(1)));
    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::readings(&[50.0, 65.0, 70.0, 85.0, 55.0, 90.0], cancel.clone());
    let notifier = RecordingNotifier::default();

    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap()
        .with_shutdown_retry(fast_retry());
    let summary = controller.run().await.unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 4, "three alerts plus the shutdown notice: {:?}", sent);
    assert!(sent[0].contains("warm") && sent[0].contains("65.0"));
    assert!(sent[1].contains("hot") && sent[1].contains("85.0"));
    assert!(sent[2].contains("hot") && sent[2].contains("90.0"));
    assert_eq!(sent[3], SHUTDOWN_MESSAGE);

    assert_eq!(summary.notifications, 3);
    assert_eq!(summary.iterations, 7);
    assert_eq!(summary.skipped, 1);
    assert!(summary.interrupted);
    assert_eq!(controller.state(), RunState::Stopped);

    // Lock released on the way out.
    assert!(RunLock::acquire(dir.path(), "device1").is_ok());
}

/// Test that a failed read is skipped without touching the notified level
#[tokio::test]
async fn test_read_failure_then_success() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), None);
    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::new(&[Some(65.0), None, Some(85.0)], cancel.clone());
    let notifier = RecordingNotifier::default();
    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap();

    let first = controller.iterate().await.unwrap();
    assert_eq!(first, IterationOutcome::Notified { celsius: 65.0, level: 0 });

    let err = controller.iterate().await.unwrap_err();
    assert!(matches!(err, MonitorError::Read { .. }));
    assert_eq!(controller.evaluator().last_notified(), Some(0));
    assert_eq!(controller.summary().skipped, 1);

    let third = controller.iterate().await.unwrap();
    assert_eq!(third, IterationOutcome::Notified { celsius: 85.0, level: 1 });
    assert_eq!(notifier.sent().len(), 2);
}

/// Test that a failed alert is retried on the next sample
#[tokio::test]
async fn test_send_failure_keeps_level() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), None);
    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::readings(&[65.0, 65.0, 65.0], cancel.clone());
    let notifier = RecordingNotifier::failing(1);
    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap();

    let err = controller.iterate().await.unwrap_err();
    assert!(matches!(err, MonitorError::Send(SendError::HttpStatus(503))));
    assert_eq!(controller.evaluator().last_notified(), None);

    let second = controller.iterate().await.unwrap();
    assert_eq!(second, IterationOutcome::Notified { celsius: 65.0, level: 0 });

    let third = controller.iterate().await.unwrap();
    assert_eq!(third, IterationOutcome::Quiet { celsius: 65.0, level: Some(0) });
    assert_eq!(notifier.sent().len(), 1);
}

/// Test that cancellation cuts a long sleep short
#[tokio::test]
async fn test_cancellation_interrupts_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), Some(Duration::from_secs(3600)));
    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::readings(&[40.0, 40.0], cancel.clone());
    let notifier = RecordingNotifier::default();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap()
        .with_shutdown_retry(fast_retry());
    let summary = tokio::time::timeout(Duration::from_secs(10), controller.run())
        .await
        .expect("run should stop promptly after cancellation")
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.iterations, 1);
    assert_eq!(notifier.sent(), vec![SHUTDOWN_MESSAGE.to_string()]);
}

/// Test that the shutdown notice is retried, then abandoned, and the lock still freed
#[tokio::test]
async fn test_shutdown_notice_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), Some(Duration::from_millis(1)));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let sensor = ScriptedSensor::readings(&[], cancel.clone());
    let notifier = RecordingNotifier::failing(usize::MAX);

    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap()
        .with_shutdown_retry(fast_retry());
    let summary = controller.run().await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(notifier.attempts(), 3);
    assert!(notifier.sent().is_empty());
    assert!(RunLock::acquire(dir.path(), "device1").is_ok());
}

/// Test that one-shot mode reports a failed read and releases the lock
#[tokio::test]
async fn test_one_shot_read_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), None);
    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::new(&[None], cancel.clone());
    let notifier = RecordingNotifier::default();

    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap();
    let err = controller.run().await.unwrap_err();

    assert!(matches!(err, MonitorError::Read { .. }));
    assert_eq!(err.exit_code(), temp_notifier::error::EXIT_FAILURE);
    assert!(notifier.sent().is_empty());
    assert_eq!(controller.state(), RunState::Stopped);
    assert!(RunLock::acquire(dir.path(), "device1").is_ok());
}

/// Test that a one-shot run above a threshold alerts exactly once
#[tokio::test]
async fn test_one_shot_alert() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), None);
    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::readings(&[81.5], cancel.clone());
    let notifier = RecordingNotifier::default();

    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap();
    let summary = controller.run().await.unwrap();

    assert_eq!(summary.iterations, 1);
    assert!(!summary.interrupted);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], "*hot*\nCurrent Temp: *81.5c*!");
}

/// Test that a held lock stops the run before any read or notification
#[tokio::test]
async fn test_lock_held_blocks_second_instance() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), None);
    let _running = RunLock::acquire(dir.path(), "device1").unwrap();

    let cancel = CancellationToken::new();
    let sensor = ScriptedSensor::readings(&[95.0], cancel.clone());
    let notifier = RecordingNotifier::default();
    let mut controller = RunController::new(&config, sensor, notifier.clone(), cancel)
        .unwrap();

    let err = controller.run().await.unwrap_err();
    assert!(matches!(err, MonitorError::LockHeld { .. }));
    assert_eq!(err.exit_code(), temp_notifier::error::EXIT_LOCK_HELD);
    assert_eq!(controller.summary().iterations, 0);
    assert_eq!(notifier.attempts(), 0);
}

/// Test that thresholds given out of order still evaluate correctly
#[tokio::test]
async fn test_rules_from_config_are_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), None);
    let limits: Vec<f32> = config.thresholds.iter().map(|r: &ThresholdRule| r.limit).collect();
    assert_eq!(limits, vec![60.0, 80.0]);
}
