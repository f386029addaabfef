//! Eating windows: a planned interval of the day with macro targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::macros::MacroTargets;

/// What a window is for. Closed set; protection lives in `PROTECTION_TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPurpose {
    SustainedEnergy,
    PreWorkout,
    PostWorkout,
    Recovery,
    Focus,
    SleepSupport,
}

/// Max fraction of a window's original calories one redistribution may move.
const PROTECTION_TABLE: &[(WindowPurpose, f64)] = &[
    (WindowPurpose::PreWorkout, 0.15),
    (WindowPurpose::PostWorkout, 0.15),
];

impl WindowPurpose {
    /// `Some(ratio)` for protected purposes, `None` when unrestricted.
    pub fn max_adjustment_ratio(self) -> Option<f64> {
        PROTECTION_TABLE
            .iter()
            .find(|(purpose, _)| *purpose == self)
            .map(|(_, ratio)| *ratio)
    }

    pub fn label(self) -> &'static str {
        match self {
            WindowPurpose::SustainedEnergy => "sustained energy",
            WindowPurpose::PreWorkout => "pre-workout",
            WindowPurpose::PostWorkout => "post-workout",
            WindowPurpose::Recovery => "recovery",
            WindowPurpose::Focus => "focus",
            WindowPurpose::SleepSupport => "sleep support",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Upcoming,
    Active,
    Consumed,
    Missed,
}

impl WindowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WindowState::Consumed | WindowState::Missed)
    }
}

/// A single planned eating interval.
///
/// `effective_target` starts equal to `original_target` and is the only target
/// redistribution touches; `original_target` is kept for display and undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WindowRecord")]
pub struct Window {
    id: String,
    name: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    purpose: WindowPurpose,
    order: u32,
    original_target: MacroTargets,
    effective_target: MacroTargets,
    consumed: MacroTargets,
    consumed_at: Option<DateTime<Utc>>,
    state: WindowState,
    deviation_resolved: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct WindowRecord {
    id: String,
    name: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    purpose: WindowPurpose,
    #[serde(default)]
    order: u32,
    original_target: MacroTargets,
    effective_target: Option<MacroTargets>,
    #[serde(default)]
    consumed: MacroTargets,
    #[serde(default)]
    consumed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_state")]
    state: WindowState,
    #[serde(default)]
    deviation_resolved: bool,
}

fn default_state() -> WindowState {
    WindowState::Upcoming
}

impl TryFrom<WindowRecord> for Window {
    type Error = ModelError;

    fn try_from(r: WindowRecord) -> Result<Self, Self::Error> {
        let mut w = Window::new(r.id, r.name, r.start, r.end, r.purpose, r.original_target)?;
        w.order = r.order;
        w.effective_target = r.effective_target.unwrap_or(r.original_target);
        w.consumed = r.consumed;
        w.consumed_at = r.consumed_at;
        w.state = r.state;
        w.deviation_resolved = r.deviation_resolved;
        Ok(w)
    }
}

impl Window {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        purpose: WindowPurpose,
        target: MacroTargets,
    ) -> Result<Self, ModelError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ModelError::EmptyWindowId);
        }
        if start >= end {
            return Err(ModelError::InvalidTimeBounds { id });
        }
        Ok(Self {
            id,
            name: name.into(),
            start,
            end,
            purpose,
            order: 0,
            original_target: target,
            effective_target: target,
            consumed: MacroTargets::zero(),
            consumed_at: None,
            state: WindowState::Upcoming,
            deviation_resolved: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn purpose(&self) -> WindowPurpose {
        self.purpose
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn original_target(&self) -> &MacroTargets {
        &self.original_target
    }

    pub fn effective_target(&self) -> &MacroTargets {
        &self.effective_target
    }

    pub fn consumed(&self) -> &MacroTargets {
        &self.consumed
    }

    pub fn consumed_at(&self) -> Option<DateTime<Utc>> {
        self.consumed_at
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn deviation_resolved(&self) -> bool {
        self.deviation_resolved
    }

    /// Eligible to receive redistributed calories.
    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }

    pub(crate) fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    pub(crate) fn set_effective_target(&mut self, target: MacroTargets) {
        self.effective_target = target;
    }

    pub(crate) fn mark_deviation_resolved(&mut self) {
        self.deviation_resolved = true;
    }

    /// Advance the state machine against the wall clock.
    ///
    /// Returns `true` when the state changed.
    pub fn refresh_state(&mut self, now: DateTime<Utc>) -> bool {
        let next = match self.state {
            WindowState::Upcoming | WindowState::Active if now >= self.end => WindowState::Missed,
            WindowState::Upcoming if now >= self.start => WindowState::Active,
            other => other,
        };
        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Record a meal eaten for this window.
    ///
    /// Meals may be logged ahead of `start` (an early lunch still counts as
    /// lunch), so an upcoming window moves straight to consumed. Further meals
    /// add to `consumed` and reopen the window for classification.
    pub fn log_meal(&mut self, meal: MacroTargets, at: DateTime<Utc>) -> Result<(), ModelError> {
        if self.state == WindowState::Missed {
            return Err(ModelError::WindowClosed(self.id.clone()));
        }
        self.consumed = self.consumed.add(&meal);
        self.consumed_at = Some(at);
        self.state = WindowState::Consumed;
        self.deviation_resolved = false;
        Ok(())
    }

    /// `(consumed - original) / original` in calories; `None` for empty targets.
    pub fn percent_deviation(&self) -> Option<f64> {
        let planned = self.original_target.total_calories();
        if planned <= 0 {
            return None;
        }
        let eaten = self.consumed.total_calories();
        Some((eaten - planned) as f64 / planned as f64)
    }
}
