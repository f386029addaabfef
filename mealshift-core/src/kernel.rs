//! Redistribution kernel: orchestration between storage, classifier and planner.
//!
//! The kernel owns the "evaluate → optionally commit" cycle for a day. It
//! serializes nothing itself; callers must not drive two kernels against the
//! same day concurrently, and stale proposals are caught by plan revision.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::KernelError;
use crate::macros::MacroTargets;
use crate::plan::DayPlan;
use crate::planner::RedistributionPlanner;
use crate::result::RedistributionResult;

/// Where day plans live between events.
pub trait DayPlanStore {
    fn load(&self, day: NaiveDate) -> Result<Option<DayPlan>, KernelError>;
    fn save(&mut self, plan: &DayPlan) -> Result<(), KernelError>;
}

/// In-process store, mainly for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    plans: HashMap<NaiveDate, DayPlan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: DayPlan) -> Self {
        self.plans.insert(plan.day(), plan);
        self
    }
}

impl DayPlanStore for MemoryStore {
    fn load(&self, day: NaiveDate) -> Result<Option<DayPlan>, KernelError> {
        Ok(self.plans.get(&day).cloned())
    }

    fn save(&mut self, plan: &DayPlan) -> Result<(), KernelError> {
        self.plans.insert(plan.day(), plan.clone());
        Ok(())
    }
}

/// A result waiting for the user's accept/reject, pinned to a plan revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub day: NaiveDate,
    pub revision: u64,
    pub result: RedistributionResult,
}

#[derive(Debug, Clone)]
pub struct RedistributionKernel<S: DayPlanStore> {
    store: S,
    planner: RedistributionPlanner,
}

impl<S: DayPlanStore> RedistributionKernel<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            planner: RedistributionPlanner::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load(&self, day: NaiveDate) -> Result<DayPlan, KernelError> {
        self.store.load(day)?.ok_or(KernelError::PlanNotFound(day))
    }

    /// Store a plan (replacing any plan for the same day).
    pub fn install(&mut self, plan: &DayPlan) -> Result<(), KernelError> {
        self.store.save(plan)
    }

    pub fn plan(&self, day: NaiveDate) -> Result<DayPlan, KernelError> {
        self.load(day)
    }

    /// Record a meal, then evaluate the day.
    pub fn log_meal(
        &mut self,
        day: NaiveDate,
        window_id: &str,
        meal: MacroTargets,
        at: DateTime<Utc>,
    ) -> Result<Option<Proposal>, KernelError> {
        let mut plan = self.load(day)?;
        plan.refresh(at);
        plan.log_meal(window_id, meal, at)?;
        self.store.save(&plan)?;
        info!(%day, window = window_id, kcal = meal.total_calories(), "meal logged");
        Ok(self.propose(&plan, at))
    }

    /// Clock tick: advance window states, persist, evaluate.
    pub fn tick(&mut self, day: NaiveDate, now: DateTime<Utc>) -> Result<Option<Proposal>, KernelError> {
        let mut plan = self.load(day)?;
        if plan.refresh(now) {
            self.store.save(&plan)?;
        }
        Ok(self.propose(&plan, now))
    }

    /// Evaluate without persisting anything; the result is flagged as a preview.
    pub fn preview(&self, day: NaiveDate, now: DateTime<Utc>) -> Result<Option<Proposal>, KernelError> {
        let mut plan = self.load(day)?;
        plan.refresh(now);
        Ok(self.propose(&plan, now).map(|mut p| {
            p.result = p.result.into_preview();
            p
        }))
    }

    fn propose(&self, plan: &DayPlan, now: DateTime<Utc>) -> Option<Proposal> {
        let trigger = plan.evaluate(now)?;
        info!(day = %plan.day(), ?trigger, "deviation detected");
        let result = self.planner.plan(&trigger, plan.windows(), &plan.context());
        Some(Proposal {
            day: plan.day(),
            revision: plan.revision(),
            result,
        })
    }

    fn load_current(&self, proposal: &Proposal) -> Result<DayPlan, KernelError> {
        let plan = self.load(proposal.day)?;
        if plan.revision() != proposal.revision {
            warn!(
                day = %proposal.day,
                expected = proposal.revision,
                actual = plan.revision(),
                "stale proposal"
            );
            return Err(KernelError::StaleProposal {
                day: proposal.day,
                expected: proposal.revision,
                actual: plan.revision(),
            });
        }
        Ok(plan)
    }

    /// Commit the proposal's adjusted targets. Previews are refused.
    pub fn accept(&mut self, proposal: &Proposal) -> Result<DayPlan, KernelError> {
        if proposal.result.is_preview {
            warn!(day = %proposal.day, "refusing to commit a preview");
            return Err(KernelError::PreviewNotCommittable(proposal.day));
        }
        let mut plan = self.load_current(proposal)?;
        plan.apply(&proposal.result)?;
        self.store.save(&plan)?;
        Ok(plan)
    }

    /// Discard the proposal; targets stay as they were.
    pub fn reject(&mut self, proposal: &Proposal) -> Result<DayPlan, KernelError> {
        let mut plan = self.load_current(proposal)?;
        plan.dismiss(&proposal.result)?;
        self.store.save(&plan)?;
        Ok(plan)
    }
}
