// Countdown Reconciler
// Spends a wall-clock "time until impact" down at the simulation's own pace

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::EpochParseError;

// =============================================================================
// IMPACT EPOCH
// =============================================================================

/// Declared absolute impact time of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImpactEpoch(DateTime<Utc>);

impl ImpactEpoch {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC),
    /// or a bare `YYYY-MM-DD` (UTC midnight).
    pub fn parse(input: &str) -> Result<Self, EpochParseError> {
        let s = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(naive.and_utc()));
            }
        }
        if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(Self(midnight.and_utc()));
        }

        Err(EpochParseError {
            input: input.to_string(),
        })
    }

    /// Like [`ImpactEpoch::parse`], but an invalid string simply means "no epoch".
    pub fn parse_lenient(input: &str) -> Option<Self> {
        match Self::parse(input) {
            Ok(epoch) => Some(epoch),
            Err(err) => {
                warn!(%err, "ignoring impact epoch");
                None
            }
        }
    }
}

impl FromStr for ImpactEpoch {
    type Err = EpochParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImpactEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

// =============================================================================
// LABELS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "remaining", rename_all = "snake_case")]
pub enum CountdownLabel {
    /// No impact epoch is set
    Unavailable,
    /// Simulated time has reached or passed the epoch
    ImpactNow,
    Remaining(String),
}

impl CountdownLabel {
    pub fn is_impact_now(&self) -> bool {
        matches!(self, CountdownLabel::ImpactNow)
    }
}

impl fmt::Display for CountdownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownLabel::Unavailable => f.write_str("unavailable"),
            CountdownLabel::ImpactNow => f.write_str("impact now"),
            CountdownLabel::Remaining(text) => f.write_str(text),
        }
    }
}

/// `"3d 0h 12m 5s"` style label. Leading zero units are dropped; seconds
/// always appear. Fractional seconds are floored.
pub fn format_remaining(total_secs: f64) -> String {
    let total = if total_secs.is_finite() && total_secs > 0.0 {
        total_secs.floor() as u64
    } else {
        0
    };
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 || !parts.is_empty() {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || !parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));

    parts.join(" ")
}

// =============================================================================
// RECONCILER
// =============================================================================

/// Tracks remaining time to the impact epoch using simulated, not wall, time.
///
/// When an epoch is set (or the simulation is reset) the wall-clock gap
/// `epoch - now` is captured once. From then on the remaining time is that
/// gap minus the simulated seconds the stepper has accumulated. Label
/// recomputation is throttled by wall-clock time.
#[derive(Debug, Clone)]
pub struct CountdownReconciler {
    epoch: Option<ImpactEpoch>,
    base_remaining_secs: Option<f64>,
    refresh_interval: Duration,
    last_refresh: Option<DateTime<Utc>>,
    label: CountdownLabel,
    reported_impact: bool,
}

impl CountdownReconciler {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            epoch: None,
            base_remaining_secs: None,
            refresh_interval,
            last_refresh: None,
            label: CountdownLabel::Unavailable,
            reported_impact: false,
        }
    }

    pub fn epoch(&self) -> Option<ImpactEpoch> {
        self.epoch
    }

    /// Returns false (and changes nothing) when `epoch` is already set.
    pub fn set_epoch(&mut self, epoch: Option<ImpactEpoch>, now: DateTime<Utc>) -> bool {
        if self.epoch == epoch {
            return false;
        }
        self.epoch = epoch;
        self.rebase(now);
        true
    }

    /// Recapture the wall-clock gap; called whenever simulated time restarts at zero.
    pub fn rebase(&mut self, now: DateTime<Utc>) {
        self.base_remaining_secs = self
            .epoch
            .map(|epoch| (epoch.at() - now).num_milliseconds() as f64 / 1000.0);
        self.last_refresh = None;
        self.reported_impact = false;
        self.label = self.compute_label(0.0);
    }

    pub fn remaining_secs(&self, simulated_elapsed_secs: f64) -> Option<f64> {
        self.base_remaining_secs
            .map(|base| base - simulated_elapsed_secs)
    }

    fn compute_label(&self, simulated_elapsed_secs: f64) -> CountdownLabel {
        match self.remaining_secs(simulated_elapsed_secs) {
            None => CountdownLabel::Unavailable,
            Some(remaining) if remaining <= 0.0 => CountdownLabel::ImpactNow,
            Some(remaining) => CountdownLabel::Remaining(format_remaining(remaining)),
        }
    }

    /// Recompute the label unless the last refresh was less than the
    /// refresh interval ago; returns the current label either way.
    pub fn refresh(&mut self, now: DateTime<Utc>, simulated_elapsed_secs: f64) -> &CountdownLabel {
        if self.epoch.is_none() {
            return &self.label;
        }
        if let Some(last) = self.last_refresh {
            if now - last < self.refresh_interval {
                return &self.label;
            }
        }

        self.last_refresh = Some(now);
        self.label = self.compute_label(simulated_elapsed_secs);

        if self.label.is_impact_now() && !self.reported_impact {
            self.reported_impact = true;
            info!(
                epoch = ?self.epoch.map(|e| e.to_string()),
                simulated_elapsed_secs,
                "countdown reached impact epoch"
            );
        }
        &self.label
    }

    pub fn label(&self) -> &CountdownLabel {
        &self.label
    }
}
