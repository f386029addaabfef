//! Day plan aggregate: owns a day's windows and applies committed results.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deviation::{DeviationClassifier, Trigger};
use crate::error::ModelError;
use crate::macros::MacroTargets;
use crate::planner::DayContext;
use crate::result::RedistributionResult;
use crate::time::local_time_to_utc;
use crate::window::{Window, WindowPurpose};

/// One user's windows for one calendar day.
///
/// Every mutation bumps `revision`, which callers use to detect that a
/// computed result no longer matches the plan it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DayPlanRecord")]
pub struct DayPlan {
    day: NaiveDate,
    windows: Vec<Window>,
    bedtime: Option<DateTime<Utc>>,
    revision: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DayPlanRecord {
    day: NaiveDate,
    windows: Vec<Window>,
    #[serde(default)]
    bedtime: Option<DateTime<Utc>>,
    #[serde(default)]
    revision: u64,
}

impl TryFrom<DayPlanRecord> for DayPlan {
    type Error = ModelError;

    fn try_from(r: DayPlanRecord) -> Result<Self, Self::Error> {
        let mut plan = DayPlan::new(r.day, r.windows, r.bedtime)?;
        plan.revision = r.revision;
        Ok(plan)
    }
}

impl DayPlan {
    /// Validate ids, sort by start time and assign `order`.
    pub fn new(
        day: NaiveDate,
        mut windows: Vec<Window>,
        bedtime: Option<DateTime<Utc>>,
    ) -> Result<Self, ModelError> {
        let mut seen = HashSet::new();
        for w in &windows {
            if !seen.insert(w.id().to_string()) {
                return Err(ModelError::DuplicateWindowId(w.id().to_string()));
            }
        }

        windows.sort_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.id().cmp(b.id())));
        for (idx, w) in windows.iter_mut().enumerate() {
            w.set_order(idx as u32);
        }

        Ok(Self {
            day,
            windows,
            bedtime,
            revision: 0,
        })
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn bedtime(&self) -> Option<DateTime<Utc>> {
        self.bedtime
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn window(&self, id: &str) -> Option<&Window> {
        self.windows.iter().find(|w| w.id() == id)
    }

    fn window_mut(&mut self, id: &str) -> Result<&mut Window, ModelError> {
        self.windows
            .iter_mut()
            .find(|w| w.id() == id)
            .ok_or_else(|| ModelError::UnknownWindow(id.to_string()))
    }

    /// Sum of original targets.
    pub fn daily_budget(&self) -> MacroTargets {
        self.context().daily_budget
    }

    pub fn context(&self) -> DayContext {
        DayContext::from_windows(&self.windows, self.bedtime)
    }

    /// Advance window states; bumps the revision only when something changed.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        for w in &mut self.windows {
            changed |= w.refresh_state(now);
        }
        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn log_meal(&mut self, window_id: &str, meal: MacroTargets, at: DateTime<Utc>) -> Result<(), ModelError> {
        self.window_mut(window_id)?.log_meal(meal, at)?;
        self.revision += 1;
        Ok(())
    }

    /// Classify the day as it stands.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Option<Trigger> {
        DeviationClassifier::new().evaluate(&self.windows, now)
    }

    /// Commit an accepted result onto the windows' effective targets.
    pub fn apply(&mut self, result: &RedistributionResult) -> Result<(), ModelError> {
        for adj in &result.adjusted_windows {
            if self.window(&adj.window_id).is_none() {
                return Err(ModelError::UnknownWindow(adj.window_id.clone()));
            }
        }
        for adj in &result.adjusted_windows {
            self.window_mut(&adj.window_id)?
                .set_effective_target(adj.adjusted_macros);
        }
        self.resolve_source(result)?;
        self.revision += 1;
        info!(day = %self.day, adjusted = result.adjusted_windows.len(), "redistribution applied");
        Ok(())
    }

    /// Drop a rejected result; only the source deviation is marked handled.
    pub fn dismiss(&mut self, result: &RedistributionResult) -> Result<(), ModelError> {
        self.resolve_source(result)?;
        self.revision += 1;
        info!(day = %self.day, "redistribution dismissed");
        Ok(())
    }

    fn resolve_source(&mut self, result: &RedistributionResult) -> Result<(), ModelError> {
        if let Some(id) = &result.source_window_id {
            self.window_mut(id)?.mark_deviation_resolved();
        }
        Ok(())
    }
}

/// One window in a hand-written day description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDraft {
    pub id: String,
    pub name: String,
    /// Local "HH:MM".
    pub start: String,
    /// Local "HH:MM".
    pub end: String,
    pub purpose: WindowPurpose,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Day description with local wall-clock times, as written in TOML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlanDraft {
    pub timezone: String,
    /// Local "HH:MM"; enables the bedtime buffer rule.
    #[serde(default)]
    pub bedtime: Option<String>,
    #[serde(default, rename = "window")]
    pub windows: Vec<WindowDraft>,
}

impl DayPlanDraft {
    pub fn into_plan(self, day: NaiveDate) -> Result<DayPlan, ModelError> {
        let tz = self.timezone;
        let resolve = |hhmm: &str| {
            local_time_to_utc(day, hhmm, &tz).map_err(|e| ModelError::InvalidTime(e.to_string()))
        };

        let mut windows = Vec::with_capacity(self.windows.len());
        for w in self.windows {
            let target = MacroTargets::new(w.protein, w.carbs, w.fat)?;
            windows.push(Window::new(
                w.id,
                w.name,
                resolve(&w.start)?,
                resolve(&w.end)?,
                w.purpose,
                target,
            )?);
        }

        let bedtime = match self.bedtime.as_deref() {
            Some(hhmm) => Some(resolve(hhmm)?),
            None => None,
        };

        DayPlan::new(day, windows, bedtime)
    }
}
