//! Redistribution output contracts.
//!
//! Serde-ready value objects handed to presentation and persistence. They
//! are built once by the planner and never mutated; accepting a result means
//! copying `adjusted_macros` onto the matching window's effective target.

use serde::{Deserialize, Serialize};

use crate::deviation::Trigger;
use crate::macros::MacroTargets;
use crate::window::Window;

/// New target for one window that the planner changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedWindow {
    pub window_id: String,
    /// Effective target before this redistribution.
    pub original_macros: MacroTargets,
    /// Whole-gram target proposed by the planner.
    pub adjusted_macros: MacroTargets,
    /// `adjusted.total_calories / original.total_calories`.
    pub adjustment_ratio: f64,
    pub reason: String,
}

impl AdjustedWindow {
    pub fn new(
        window_id: impl Into<String>,
        original_macros: MacroTargets,
        adjusted_macros: MacroTargets,
        reason: impl Into<String>,
    ) -> Self {
        let before = original_macros.total_calories();
        let adjustment_ratio = if before > 0 {
            adjusted_macros.total_calories() as f64 / before as f64
        } else {
            1.0
        };
        Self {
            window_id: window_id.into(),
            original_macros,
            adjusted_macros,
            adjustment_ratio,
            reason: reason.into(),
        }
    }

    /// Signed calorie change.
    pub fn calorie_delta(&self) -> i64 {
        self.adjusted_macros.total_calories() - self.original_macros.total_calories()
    }
}

/// Outcome of one redistribution event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionResult {
    pub trigger: Trigger,
    /// Window the trigger was attributed to, when it could be located.
    pub source_window_id: Option<String>,
    /// Snapshot of the day before adjustment.
    pub original_windows: Vec<Window>,
    pub adjusted_windows: Vec<AdjustedWindow>,
    pub explanation: String,
    pub educational_tip: Option<String>,
    /// 0.0..=1.0; 0.0 means nothing could be adjusted at all.
    pub confidence_score: f64,
    /// Sum of per-macro |delta| across adjusted windows.
    pub total_redistributed: MacroTargets,
    /// Calories that protection rules left without a home.
    pub unplaced_calories: i64,
    pub is_preview: bool,
}

impl RedistributionResult {
    /// Nothing to change (no eligible windows, or nothing left to move).
    pub fn is_noop(&self) -> bool {
        self.adjusted_windows.is_empty()
    }

    pub fn adjustment_for(&self, window_id: &str) -> Option<&AdjustedWindow> {
        self.adjusted_windows.iter().find(|a| a.window_id == window_id)
    }

    /// Same result, flagged as a preview that must not be committed.
    pub fn into_preview(mut self) -> Self {
        self.is_preview = true;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence_score must be within 0..=1 (got {})",
                self.confidence_score
            ));
        }
        if self.explanation.trim().is_empty() {
            return Err("explanation must be non-empty".to_string());
        }
        for (idx, adj) in self.adjusted_windows.iter().enumerate() {
            if adj.window_id.trim().is_empty() {
                return Err(format!("adjusted_windows[{idx}]: window_id must be non-empty"));
            }
            if !self.original_windows.iter().any(|w| w.id() == adj.window_id) {
                return Err(format!(
                    "adjusted_windows[{idx}]: '{}' is not part of the snapshot",
                    adj.window_id
                ));
            }
        }
        Ok(())
    }
}
