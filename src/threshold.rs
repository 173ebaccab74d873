//! Edge-triggered threshold evaluation.
//!
//! The evaluator keeps the highest threshold level already notified for this
//! run. A reading that reaches a higher level produces an [`Alert`]; a reading
//! that falls back below the notified level silently re-arms the lower levels.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};

/// A temperature limit and the message sent when it is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Limit in degrees Celsius. Readings `>= limit` reach this rule.
    pub limit: f32,
    /// Message template. `{temp}` is replaced with the reading.
    pub message: String,
}

impl ThresholdRule {
    pub fn new(limit: f32, message: impl Into<String>) -> Self {
        Self {
            limit,
            message: message.into(),
        }
    }

    /// The stock Raspberry Pi thresholds.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(60.0, "TEMPERATURE IS CLIMBING > 60c. Keep an eye on it:"),
            Self::new(70.0, "TEMPERATURE IS HIGH > 70c:"),
            Self::new(80.0, "TEMPERATURE IS VERY HIGH > 80c:"),
        ]
    }

    /// Sort rules ascending and reject non-finite or duplicate limits.
    pub fn validate_ordered(mut rules: Vec<Self>) -> Result<Vec<Self>> {
        if let Some(rule) = rules.iter().find(|r| !r.limit.is_finite()) {
            return Err(MonitorError::config_error(format!(
                "threshold limit must be a finite number, got {}",
                rule.limit
            )));
        }

        rules.sort_by(|a, b| a.limit.total_cmp(&b.limit));

        if let Some(pair) = rules.windows(2).find(|w| w[0].limit >= w[1].limit) {
            return Err(MonitorError::config_error(format!(
                "duplicate threshold limit {}",
                pair[1].limit
            )));
        }

        Ok(rules)
    }

    /// Render the notification text for a reading.
    pub fn render(&self, reading: f32) -> String {
        let message = self.message.replace("{temp}", &format_temp(reading));
        format!("*{}*\nCurrent Temp: *{}c*!", message, format_temp(reading))
    }
}

fn format_temp(reading: f32) -> String {
    format!("{:.1}", reading)
}

/// A notification the evaluator wants dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Index of the reached rule.
    pub level: usize,
    pub limit: f32,
    pub reading: f32,
    /// Rendered message text.
    pub text: String,
}

/// Outcome of evaluating one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationDecision {
    /// A higher threshold was reached.
    Notify(Alert),
    /// The reading dropped below the notified level; state was lowered.
    Rearmed { level: Option<usize> },
    /// Nothing changed.
    Unchanged { level: Option<usize> },
}

/// Tracks the notified level for one run.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    rules: Vec<ThresholdRule>,
    last_notified: Option<usize>,
}

impl ThresholdEvaluator {
    /// Create an evaluator. Rules are sorted by limit.
    ///
    /// # Errors
    ///
    /// A configuration error for non-finite or duplicate limits, as in
    /// [`ThresholdRule::validate_ordered`].
    pub fn new(rules: Vec<ThresholdRule>) -> Result<Self> {
        Ok(Self {
            rules: ThresholdRule::validate_ordered(rules)?,
            last_notified: None,
        })
    }

    /// Highest level notified so far in this run.
    pub fn last_notified(&self) -> Option<usize> {
        self.last_notified
    }

    /// Index of the highest rule whose limit is `<= reading`.
    pub fn level_for(&self, reading: f32) -> Option<usize> {
        self.rules.iter().rposition(|rule| rule.limit <= reading)
    }

    /// Compare a reading against the notified level.
    ///
    /// Rising to a new level returns [`NotificationDecision::Notify`] without
    /// recording it; call [`mark_notified`](Self::mark_notified) once the
    /// alert was delivered. Falling lowers the level immediately.
    pub fn evaluate(&mut self, reading: f32) -> NotificationDecision {
        let current = self.level_for(reading);

        if current > self.last_notified {
            // `current > None` implies `current` is `Some`.
            let level = current.unwrap_or_default();
            let rule = &self.rules[level];
            return NotificationDecision::Notify(Alert {
                level,
                limit: rule.limit,
                reading,
                text: rule.render(reading),
            });
        }

        if current < self.last_notified {
            self.last_notified = current;
            return NotificationDecision::Rearmed { level: current };
        }

        NotificationDecision::Unchanged { level: current }
    }

    /// Record that an alert was delivered.
    pub fn mark_notified(&mut self, alert: &Alert) {
        if Some(alert.level) > self.last_notified {
            self.last_notified = Some(alert.level);
        }
    }
}
