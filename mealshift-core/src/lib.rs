//! mealshift-core: meal window redistribution engine
//!
//! Given a day split into eating windows, detects when actual eating drifts
//! from plan and recomputes targets for the windows still ahead.

pub mod deviation;
pub mod error;
pub mod explain;
pub mod kernel;
pub mod macros;
pub mod plan;
pub mod planner;
pub mod result;
pub mod time;
pub mod window;

pub use deviation::{DEVIATION_THRESHOLD, DeviationClassifier, Trigger, TriggerKind};
pub use error::{KernelError, ModelError};
pub use kernel::{DayPlanStore, MemoryStore, Proposal, RedistributionKernel};
pub use macros::MacroTargets;
pub use plan::{DayPlan, DayPlanDraft, WindowDraft};
pub use planner::{DayContext, RedistributionPlanner};
pub use result::{AdjustedWindow, RedistributionResult};
pub use window::{Window, WindowPurpose, WindowState};
