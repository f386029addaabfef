//! Human-readable text for redistribution results.

use crate::deviation::{Trigger, TriggerKind};
use crate::window::Window;

const OVERCONSUMPTION_TIPS: &[&str] = &[
    "One bigger meal does not undo a day. Trimming carbs and fat later keeps protein steady while your total stays on track.",
    "Large meals digest slowly; a lighter next window often feels better than skipping it entirely.",
];

const UNDERCONSUMPTION_TIPS: &[&str] = &[
    "Spreading a shortfall across the rest of the day is easier on digestion than one oversized catch-up meal.",
    "Under-eating early tends to show up as cravings later. Adding a little to each remaining window smooths that out.",
];

const MISSED_WINDOW_TIPS: &[&str] = &[
    "Missing a window happens. Nearby meals absorb most of it so the evening stays light before sleep.",
    "If windows keep getting missed at the same time of day, consider moving that window instead of compensating every day.",
];

/// Deterministic tip for a trigger kind; `seed` picks among the variants.
pub fn educational_tip(kind: TriggerKind, seed: usize) -> String {
    let tips = match kind {
        TriggerKind::Overconsumption => OVERCONSUMPTION_TIPS,
        TriggerKind::Underconsumption => UNDERCONSUMPTION_TIPS,
        TriggerKind::MissedWindow => MISSED_WINDOW_TIPS,
    };
    tips[seed % tips.len()].to_string()
}

/// Short per-window reason.
pub fn adjustment_reason(trigger: &Trigger, source_name: &str) -> String {
    match trigger {
        Trigger::Overconsumption { .. } => format!("Reduced due to earlier overconsumption at {source_name}"),
        Trigger::Underconsumption { .. } => format!("Increased to make up for a light {source_name}"),
        Trigger::MissedWindow { .. } => format!("Increased to cover the missed {source_name} window"),
    }
}

/// Text for a deviation the remaining targets already make up for.
pub fn on_budget_explanation(trigger: &Trigger, source_name: &str) -> String {
    let what = match trigger {
        Trigger::Overconsumption { percent_over } => format!("came in {percent_over:.0}% over plan"),
        Trigger::Underconsumption { percent_under } => format!("came in {percent_under:.0}% under plan"),
        Trigger::MissedWindow { .. } => "was missed".to_string(),
    };
    format!(
        "{source_name} {what}, but your remaining windows already add up to today's budget, so nothing needs to move."
    )
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Summary sentence for a result.
pub fn explanation(
    trigger: &Trigger,
    source: Option<&Window>,
    moved_calories: i64,
    affected: usize,
    unplaced_calories: i64,
) -> String {
    let source_name = source.map_or("an earlier window", Window::name);

    if affected == 0 {
        if unplaced_calories > 0 {
            return format!(
                "No remaining window could take the {unplaced_calories} kcal from {source_name} without breaking a protection rule, so the rest of today stays as planned."
            );
        }
        return "No adjustment needed or possible: there are no remaining windows to rebalance today.".to_string();
    }

    let mut text = match trigger {
        Trigger::Overconsumption { percent_over } => format!(
            "{source_name} came in {percent_over:.0}% over plan, so {moved_calories} kcal were trimmed across your next {affected} window{}.",
            plural(affected)
        ),
        Trigger::Underconsumption { percent_under } => format!(
            "{source_name} came in {percent_under:.0}% under plan, so {moved_calories} kcal were added across your next {affected} window{}.",
            plural(affected)
        ),
        Trigger::MissedWindow { .. } => format!(
            "{source_name} was missed, so its {moved_calories} kcal were moved into your next {affected} window{}.",
            plural(affected)
        ),
    };

    if unplaced_calories > 0 {
        text.push_str(&format!(
            " {unplaced_calories} kcal could not be placed without breaking a protection rule."
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tips_are_keyed_and_deterministic() {
        let a = educational_tip(TriggerKind::MissedWindow, 3);
        let b = educational_tip(TriggerKind::MissedWindow, 3);
        assert_eq!(a, b);
        assert!(MISSED_WINDOW_TIPS.contains(&a.as_str()));
        assert_ne!(
            educational_tip(TriggerKind::Overconsumption, 0),
            educational_tip(TriggerKind::Underconsumption, 0)
        );
    }

    #[test]
    fn explanation_mentions_magnitude_and_count() {
        let t = Trigger::Overconsumption { percent_over: 50.0 };
        let text = explanation(&t, None, 300, 2, 0);
        assert!(text.contains("50%"));
        assert!(text.contains("300 kcal"));
        assert!(text.contains("2 windows"));
        assert!(!text.contains("could not be placed"));
    }

    #[test]
    fn explanation_flags_partial_placement() {
        let t = Trigger::Underconsumption { percent_under: 40.0 };
        let text = explanation(&t, None, 200, 1, 40);
        assert!(text.contains("1 window."));
        assert!(text.contains("40 kcal could not be placed"));
    }

    #[test]
    fn on_budget_explanation_does_not_claim_the_day_is_over() {
        let t = Trigger::Underconsumption { percent_under: 28.57 };
        let text = on_budget_explanation(&t, "Lunch");
        assert!(text.starts_with("Lunch came in 29% under plan"));
        assert!(text.contains("already add up to today's budget"));
        assert!(!text.contains("no remaining windows"));
    }

    #[test]
    fn noop_explanation() {
        let t = Trigger::Underconsumption { percent_under: 40.0 };
        assert!(explanation(&t, None, 0, 0, 0).starts_with("No adjustment needed"));
    }
}
