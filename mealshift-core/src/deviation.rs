//! Deviation classification: decides whether a day needs redistribution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::window::{Window, WindowState};

/// Relative calorie deviation that counts as a trigger, either direction.
pub const DEVIATION_THRESHOLD: f64 = 0.25;

/// Why redistribution is being considered.
///
/// Carries only what the explanation needs, never the adjustment amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Overconsumption { percent_over: f64 },
    Underconsumption { percent_under: f64 },
    MissedWindow { window_id: String },
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Overconsumption { .. } => TriggerKind::Overconsumption,
            Trigger::Underconsumption { .. } => TriggerKind::Underconsumption,
            Trigger::MissedWindow { .. } => TriggerKind::MissedWindow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Overconsumption,
    Underconsumption,
    MissedWindow,
}

/// The window a trigger refers to.
///
/// Over/under-consumption refer to the most recently consumed window;
/// a missed window names itself.
pub fn trigger_source<'a>(trigger: &Trigger, windows: &'a [Window]) -> Option<&'a Window> {
    match trigger {
        Trigger::MissedWindow { window_id } => windows.iter().find(|w| w.id() == window_id),
        Trigger::Overconsumption { .. } | Trigger::Underconsumption { .. } => {
            most_recently_consumed(windows)
        }
    }
}

/// Latest consumed window by log time, falling back to start time.
pub fn most_recently_consumed(windows: &[Window]) -> Option<&Window> {
    windows
        .iter()
        .filter(|w| w.state() == WindowState::Consumed)
        .max_by(|a, b| {
            a.consumed_at()
                .cmp(&b.consumed_at())
                .then_with(|| a.start().cmp(&b.start()))
                .then_with(|| b.id().cmp(a.id()))
        })
}

/// Fixed-rule classifier. Stateless; the threshold is not configurable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviationClassifier;

impl DeviationClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the day at `now`.
    ///
    /// A missed window wins over a consumption deviation found in the same
    /// pass. Windows whose deviation was already resolved never fire again.
    pub fn evaluate(&self, windows: &[Window], now: DateTime<Utc>) -> Option<Trigger> {
        if let Some(missed) = self.missed_window(windows, now) {
            debug!(window = missed.id(), "missed window detected");
            return Some(Trigger::MissedWindow {
                window_id: missed.id().to_string(),
            });
        }
        self.consumption_deviation(windows)
    }

    fn missed_window<'a>(&self, windows: &'a [Window], now: DateTime<Utc>) -> Option<&'a Window> {
        windows
            .iter()
            .filter(|w| !w.deviation_resolved())
            .filter(|w| w.end() < now && w.state() != WindowState::Consumed)
            .min_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.id().cmp(b.id())))
    }

    fn consumption_deviation(&self, windows: &[Window]) -> Option<Trigger> {
        let latest = most_recently_consumed(windows)?;
        if latest.deviation_resolved() {
            return None;
        }
        let deviation = latest.percent_deviation()?;
        debug!(window = latest.id(), deviation, "consumption deviation");

        if deviation >= DEVIATION_THRESHOLD {
            Some(Trigger::Overconsumption {
                percent_over: deviation * 100.0,
            })
        } else if deviation <= -DEVIATION_THRESHOLD {
            Some(Trigger::Underconsumption {
                percent_under: deviation.abs() * 100.0,
            })
        } else {
            None
        }
    }
}
