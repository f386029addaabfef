//! Redistribution planner: moves a calorie deviation into the remaining windows.
//!
//! Algorithm (deterministic, single pass):
//! 1) size the delta from the trigger, bounded by the day's budget
//! 2) rank open windows by distance from the triggering window
//! 3) cap each window by the protection rules (workout cap, protein floor,
//!    bedtime buffer)
//! 4) water-fill the delta by proximity-weighted original calories,
//!    saturating capped windows and re-spreading what they could not take
//! 5) round to whole grams once, at the end, keeping the day total intact
//!
//! The planner is a pure function of its inputs and never fails for a valid
//! day; degenerate cases come back as no-op or lower-confidence results.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::deviation::{Trigger, trigger_source};
use crate::explain::{adjustment_reason, educational_tip, explanation, on_budget_explanation};
use crate::macros::{FAT_KCAL_PER_G, MacroTargets};
use crate::result::{AdjustedWindow, RedistributionResult};
use crate::window::Window;

/// Protein may never be planned below this share of the original target.
pub const PROTEIN_FLOOR_RATIO: f64 = 0.70;
/// The last window must end this long before bedtime to receive extra calories.
pub const BEDTIME_BUFFER_HOURS: i64 = 3;
/// Confidence points (out of 100) lost per protection rule that limited a window.
pub const PROTECTION_PENALTY_PCT: i64 = 15;
/// Confidence points (out of 100) lost when part of the delta could not be placed.
pub const UNPLACED_PENALTY_PCT: i64 = 30;

/// Sub-calorie amounts vanish at the whole-gram boundary.
const PLACEMENT_EPSILON: f64 = 0.5;

/// Day-level inputs the planner needs besides the windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayContext {
    /// Total macro budget for the day; redistribution never moves past it.
    pub daily_budget: MacroTargets,
    pub bedtime: Option<DateTime<Utc>>,
}

impl DayContext {
    /// Budget taken as the sum of the windows' original targets.
    pub fn from_windows(windows: &[Window], bedtime: Option<DateTime<Utc>>) -> Self {
        let daily_budget = windows
            .iter()
            .fold(MacroTargets::zero(), |acc, w| acc.add(w.original_target()));
        Self {
            daily_budget,
            bedtime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Add,
    Remove,
}

/// Rule that limited how much a window could absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtectionRule {
    WorkoutCap,
    ProteinFloor,
    BedtimeBuffer,
}

#[derive(Debug, Clone)]
struct Slot<'a> {
    window: &'a Window,
    weight: f64,
    capacity: f64,
    limit: Option<ProtectionRule>,
    given: f64,
    saturated: bool,
}

impl Slot<'_> {
    fn room(&self) -> f64 {
        (self.capacity - self.given).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RedistributionPlanner;

impl RedistributionPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan a redistribution of `trigger` over the day's `windows`.
    ///
    /// `windows` is the whole day; consumed and missed windows are never
    /// adjusted but still count towards the budget.
    pub fn plan(&self, trigger: &Trigger, windows: &[Window], ctx: &DayContext) -> RedistributionResult {
        let Some(source) = trigger_source(trigger, windows) else {
            warn!(?trigger, "trigger does not match any window");
            return noop(trigger, None, windows, explanation(trigger, None, 0, 0, 0));
        };

        let eligible: Vec<&Window> = windows
            .iter()
            .filter(|w| w.is_open() && w.id() != source.id())
            .collect();
        if eligible.is_empty() {
            info!(source = source.id(), "no remaining windows to redistribute into");
            return noop(trigger, Some(source), windows, explanation(trigger, Some(source), 0, 0, 0));
        }

        let (direction, delta) = requested_delta(trigger, source);
        let amount = delta.min(budget_gap(direction, windows, &eligible, ctx));
        debug!(?direction, delta, amount, "sized redistribution");
        if amount <= PLACEMENT_EPSILON {
            info!(source = source.id(), delta, "day already within budget");
            return noop(trigger, Some(source), windows, on_budget_explanation(trigger, source.name()));
        }

        let mut slots = build_slots(direction, source, &eligible, windows, ctx);
        let unplaced = water_fill(&mut slots, amount);

        let adjusted = finalize(trigger, source, direction, &slots);
        let violations = slots
            .iter()
            .filter(|s| s.saturated && s.limit.is_some())
            .count();
        let unplaced_calories = if unplaced > PLACEMENT_EPSILON {
            unplaced.round() as i64
        } else {
            0
        };

        // Integer points so the fixed steps land on exact decimals.
        let mut points = 100 - PROTECTION_PENALTY_PCT * violations as i64;
        if unplaced_calories > 0 {
            points -= UNPLACED_PENALTY_PCT;
        }
        let confidence_score = points.max(0) as f64 / 100.0;

        if unplaced_calories > 0 {
            warn!(unplaced_calories, violations, "protection rules left calories unplaced");
        }

        let total_redistributed = adjusted.iter().fold(MacroTargets::zero(), |acc, a| {
            acc.add(&a.adjusted_macros.abs_diff(&a.original_macros))
        });
        let moved: i64 = adjusted.iter().map(|a| a.calorie_delta().abs()).sum();

        info!(
            source = source.id(),
            adjusted = adjusted.len(),
            moved,
            confidence_score,
            "redistribution planned"
        );

        RedistributionResult {
            trigger: trigger.clone(),
            source_window_id: Some(source.id().to_string()),
            original_windows: windows.to_vec(),
            explanation: explanation(trigger, Some(source), moved, adjusted.len(), unplaced_calories),
            educational_tip: Some(educational_tip(trigger.kind(), tip_seed(source, windows))),
            adjusted_windows: adjusted,
            confidence_score,
            total_redistributed,
            unplaced_calories,
            is_preview: false,
        }
    }
}

/// Position of the source in the day, by start time.
fn tip_seed(source: &Window, windows: &[Window]) -> usize {
    windows.iter().filter(|w| w.start() < source.start()).count()
}

fn noop(trigger: &Trigger, source: Option<&Window>, windows: &[Window], explanation: String) -> RedistributionResult {
    RedistributionResult {
        trigger: trigger.clone(),
        source_window_id: source.map(|w| w.id().to_string()),
        original_windows: windows.to_vec(),
        adjusted_windows: Vec::new(),
        explanation,
        educational_tip: None,
        confidence_score: 0.0,
        total_redistributed: MacroTargets::zero(),
        unplaced_calories: 0,
        is_preview: false,
    }
}

fn requested_delta(trigger: &Trigger, source: &Window) -> (Direction, f64) {
    let planned = source.original_target().calories();
    let eaten = source.consumed().calories();
    match trigger {
        Trigger::Overconsumption { .. } => (Direction::Remove, (eaten - planned).max(0.0)),
        Trigger::Underconsumption { .. } => (Direction::Add, (planned - eaten).max(0.0)),
        Trigger::MissedWindow { .. } => (Direction::Add, planned),
    }
}

/// How far the day currently sits from its budget in the requested direction.
fn budget_gap(direction: Direction, windows: &[Window], eligible: &[&Window], ctx: &DayContext) -> f64 {
    let committed: f64 = windows
        .iter()
        .map(|w| {
            if eligible.iter().any(|e| e.id() == w.id()) {
                w.effective_target().calories()
            } else {
                w.consumed().calories()
            }
        })
        .sum();
    let budget = ctx.daily_budget.calories();
    let gap = match direction {
        Direction::Add => budget - committed,
        Direction::Remove => committed - budget,
    };
    gap.max(0.0)
}

fn hours_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (a - b).num_seconds().abs() as f64 / 3600.0
}

fn build_slots<'a>(
    direction: Direction,
    source: &Window,
    eligible: &[&'a Window],
    windows: &[Window],
    ctx: &DayContext,
) -> Vec<Slot<'a>> {
    let last_end = windows.iter().map(Window::end).max();
    let bedtime_limit = ctx
        .bedtime
        .map(|b| b - Duration::hours(BEDTIME_BUFFER_HOURS));

    let mut ranked: Vec<(&'a Window, f64)> = eligible
        .iter()
        .map(|w| (*w, hours_between(w.start(), source.start())))
        .collect();
    ranked.sort_by(|a, b| {
        a.1.total_cmp(&b.1)
            .then_with(|| a.0.start().cmp(&b.0.start()))
            .then_with(|| a.0.id().cmp(b.0.id()))
    });

    ranked
        .into_iter()
        .map(|(window, distance)| {
            let original = window.original_target().calories();
            let effective = window.effective_target();

            let (mut capacity, mut limit) = match direction {
                // Protein stays put; carbs and fat take the cut.
                Direction::Remove => (effective.carb_fat_calories(), Some(ProtectionRule::ProteinFloor)),
                Direction::Add => ((2.0 * original - effective.calories()).max(0.0), None),
            };

            if let Some(ratio) = window.purpose().max_adjustment_ratio() {
                let cap = ratio * original;
                if cap < capacity {
                    capacity = cap;
                    limit = Some(ProtectionRule::WorkoutCap);
                }
            }

            let is_last = Some(window.end()) == last_end;
            if direction == Direction::Add
                && is_last
                && bedtime_limit.is_some_and(|limit_at| window.end() > limit_at)
            {
                capacity = 0.0;
                limit = Some(ProtectionRule::BedtimeBuffer);
            }

            debug!(
                window = window.id(),
                distance_hours = distance,
                capacity,
                ?limit,
                "ranked window"
            );

            Slot {
                window,
                weight: original / (1.0 + distance),
                capacity,
                limit,
                given: 0.0,
                saturated: false,
            }
        })
        .collect()
}

/// Spread `amount` over the slots; returns what could not be placed.
fn water_fill(slots: &mut [Slot<'_>], amount: f64) -> f64 {
    let mut remaining = amount;

    while remaining > PLACEMENT_EPSILON {
        let open: Vec<usize> = (0..slots.len())
            .filter(|&i| !slots[i].saturated && slots[i].weight > 0.0)
            .collect();
        if open.is_empty() {
            break;
        }

        let total_weight: f64 = open.iter().map(|&i| slots[i].weight).sum();
        let mut shares: Vec<(usize, f64)> = open
            .iter()
            .map(|&i| (i, remaining * slots[i].weight / total_weight))
            .collect();
        shares.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let capped: Vec<(usize, f64)> = shares
            .iter()
            .copied()
            .filter(|&(i, share)| share >= slots[i].room())
            .collect();

        if capped.is_empty() {
            for (i, share) in shares {
                slots[i].given += share;
            }
            remaining = 0.0;
            break;
        }

        for (i, _) in capped {
            let room = slots[i].room();
            slots[i].given += room;
            slots[i].saturated = true;
            remaining -= room;
        }
    }

    remaining.max(0.0)
}

/// Turn float allocations into whole-gram targets.
///
/// Calorie targets are apportioned with largest remainders so their sum
/// matches the unrounded sum, then each is split into whole grams.
fn finalize(trigger: &Trigger, source: &Window, direction: Direction, slots: &[Slot<'_>]) -> Vec<AdjustedWindow> {
    let changed: Vec<(&Slot<'_>, f64)> = slots
        .iter()
        .filter(|s| s.given > f64::EPSILON)
        .map(|s| {
            let current = s.window.effective_target().calories();
            let next = match direction {
                Direction::Add => current + s.given,
                Direction::Remove => current - s.given,
            };
            (s, next.max(0.0))
        })
        .collect();

    let targets = apportion(&changed.iter().map(|(_, kcal)| *kcal).collect::<Vec<_>>());
    let reason = adjustment_reason(trigger, source.name());

    changed
        .iter()
        .zip(targets)
        .filter_map(|((slot, _), target_kcal)| {
            let window = slot.window;
            let original = window.original_target();
            let effective = *window.effective_target();

            let protein = effective.protein().max(PROTEIN_FLOOR_RATIO * original.protein());
            let fat_share = if original.carb_fat_calories() > 0.0 {
                original.fat() * FAT_KCAL_PER_G / original.carb_fat_calories()
            } else {
                0.0
            };
            let adjusted = MacroTargets::solve_whole_grams(target_kcal, protein, fat_share);
            if adjusted == effective {
                return None;
            }
            Some(AdjustedWindow::new(window.id(), effective, adjusted, reason.clone()))
        })
        .collect()
}

/// Round values to integers whose sum equals the rounded sum of the inputs.
fn apportion(values: &[f64]) -> Vec<i64> {
    let mut out: Vec<i64> = values.iter().map(|v| v.floor() as i64).collect();
    let target = values.iter().sum::<f64>().round() as i64;
    let mut short = target - out.iter().sum::<i64>();

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = values[a] - values[a].floor();
        let fb = values[b] - values[b].floor();
        fb.total_cmp(&fa).then_with(|| a.cmp(&b))
    });

    for i in order {
        if short <= 0 {
            break;
        }
        out[i] += 1;
        short -= 1;
    }
    out
}
