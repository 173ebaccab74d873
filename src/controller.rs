//! Run controller.
//!
//! Drives one monitor run through `Starting -> Running -> Stopping ->
//! Stopped`. The controller owns the sensor, the notifier and the threshold
//! state. Termination signals never do I/O themselves: they cancel a
//! [`CancellationToken`], and the controller performs the shutdown
//! notification and lock release.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::lock::RunLock;
use crate::notify::{send_with_retry, Notifier, RetryPolicy, SHUTDOWN_MESSAGE};
use crate::sensor::{take_reading, TemperatureSensor};
use crate::threshold::{NotificationDecision, ThresholdEvaluator};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of a monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Reading below every threshold.
    Optimal { celsius: f32 },
    /// Reading at an already-notified level, or re-armed after a drop.
    Quiet { celsius: f32, level: Option<usize> },
    /// An alert was delivered.
    Notified { celsius: f32, level: usize },
}

/// Counters reported when a run ends cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub notifications: u64,
    /// Iterations whose side effects were skipped because of an error.
    pub skipped: u64,
    /// The run was ended by a cancellation request.
    pub interrupted: bool,
}

/// Orchestrates lock, sampling, evaluation and notification for one device.
pub struct RunController<'a, S, N> {
    config: &'a MonitorConfig,
    sensor: S,
    notifier: N,
    evaluator: ThresholdEvaluator,
    cancel: CancellationToken,
    shutdown_retry: RetryPolicy,
    state: RunState,
    summary: RunSummary,
}

impl<'a, S, N> RunController<'a, S, N>
where
    S: TemperatureSensor + Send,
    N: Notifier + Sync,
{
    /// # Errors
    ///
    /// A configuration error if `config.thresholds` holds non-finite or
    /// duplicate limits.
    pub fn new(
        config: &'a MonitorConfig,
        sensor: S,
        notifier: N,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            config,
            sensor,
            notifier,
            evaluator: ThresholdEvaluator::new(config.thresholds.clone())?,
            cancel,
            shutdown_retry: RetryPolicy::default(),
            state: RunState::Starting,
            summary: RunSummary::default(),
        })
    }

    /// Override the retry policy used for the shutdown notification.
    pub fn with_shutdown_retry(mut self, policy: RetryPolicy) -> Self {
        self.shutdown_retry = policy;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn evaluator(&self) -> &ThresholdEvaluator {
        &self.evaluator
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn transition(&mut self, next: RunState) {
        info!(device = %self.config.device_name, from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }

    /// Execute the run: acquire the lock, sample once or in a loop, and
    /// stop on cancellation.
    ///
    /// The lock is held by a scoped guard and released on every return path.
    ///
    /// # Errors
    ///
    /// [`MonitorError::LockHeld`] when another instance runs for the device.
    /// In one-shot mode a failed read or send is returned as well.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let device = self.config.device_name.clone();
        let mut lock = match RunLock::acquire(&self.config.lock_dir, &device) {
            Ok(lock) => lock,
            Err(e) => {
                match &e {
                    MonitorError::LockHeld { .. } => {
                        warn!(device = %device, "Temp monitor is already running, exiting")
                    }
                    _ => error!(device = %device, error = %e, "Failed to acquire lock"),
                }
                self.transition(RunState::Stopped);
                return Err(e);
            }
        };

        self.transition(RunState::Running);
        let result = match self.config.interval {
            None => self.run_once().await,
            Some(interval) => self.run_continuous(interval).await,
        };

        if self.summary.interrupted {
            self.transition(RunState::Stopping);
            self.send_shutdown_notice().await;
        }

        lock.release();
        self.transition(RunState::Stopped);

        match result {
            Ok(()) => {
                info!(
                    device = %device,
                    iterations = self.summary.iterations,
                    notifications = self.summary.notifications,
                    skipped = self.summary.skipped,
                    interrupted = self.summary.interrupted,
                    "Monitor run finished"
                );
                Ok(self.summary.clone())
            }
            Err(e) => Err(e),
        }
    }

    async fn run_once(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(device = %self.config.device_name, "Interrupted during sample");
                self.summary.interrupted = true;
                Ok(())
            }
            outcome = self.iterate() => outcome.map(|_| ()),
        }
    }

    async fn run_continuous(&mut self, interval: Duration) -> Result<()> {
        let cancel = self.cancel.clone();
        info!(
            device = %self.config.device_name,
            interval_secs = interval.as_secs_f64(),
            "Sampling continuously"
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.iterate() => outcome,
            };
            match outcome {
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => debug!(error = %e, "Iteration skipped, continuing"),
                Ok(_) => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(device = %self.config.device_name, "Cancellation requested");
        self.summary.interrupted = true;
        Ok(())
    }

    /// One sample-evaluate-notify cycle.
    ///
    /// Errors are logged here with device context; the threshold state is
    /// only raised after a delivered alert.
    pub async fn iterate(&mut self) -> Result<IterationOutcome> {
        let device = self.config.device_name.as_str();
        self.summary.iterations += 1;

        debug!(device, source = self.sensor.source(), "Retrieving temperature");
        let reading = match take_reading(&mut self.sensor, device).await {
            Ok(reading) => reading,
            Err(e) => {
                self.summary.skipped += 1;
                error!(device, operation = "read", error = %e, "Skipping sample");
                return Err(e);
            }
        };
        let celsius = reading.celsius;
        info!(device, celsius, source = %reading.source, "Temperature received");

        match self.evaluator.evaluate(celsius) {
            NotificationDecision::Notify(alert) => {
                warn!(device, celsius, limit = alert.limit, "Temperature exceeds threshold");
                if let Err(e) = self.notifier.send(&alert.text).await {
                    self.summary.skipped += 1;
                    error!(device, operation = "notify", limit = alert.limit, error = %e, "Failed to send notification");
                    return Err(e.into());
                }
                self.evaluator.mark_notified(&alert);
                self.summary.notifications += 1;
                info!(device, level = alert.level, limit = alert.limit, "Notification sent");
                Ok(IterationOutcome::Notified {
                    celsius,
                    level: alert.level,
                })
            }
            NotificationDecision::Rearmed { level } => {
                info!(device, celsius, ?level, "Temperature dropped, thresholds re-armed");
                Ok(self.quiet_outcome(celsius, level))
            }
            NotificationDecision::Unchanged { level } => Ok(self.quiet_outcome(celsius, level)),
        }
    }

    fn quiet_outcome(&self, celsius: f32, level: Option<usize>) -> IterationOutcome {
        match level {
            None => {
                info!(device = %self.config.device_name, celsius, "Temperature optimal");
                IterationOutcome::Optimal { celsius }
            }
            Some(_) => IterationOutcome::Quiet { celsius, level },
        }
    }

    async fn send_shutdown_notice(&self) {
        let device = self.config.device_name.as_str();
        match send_with_retry(&self.notifier, SHUTDOWN_MESSAGE, self.shutdown_retry).await {
            Ok(()) => info!(device, "Shutdown notification sent"),
            Err(e) => error!(device, operation = "notify", error = %e, "Giving up on shutdown notification"),
        }
    }
}
