use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use mealshift_core::{DayPlan, MacroTargets, RedistributionResult, Trigger, WindowState};

fn hhmm(t: DateTime<Utc>, tz: Tz) -> String {
    t.with_timezone(&tz).format("%H:%M").to_string()
}

fn grams(m: &MacroTargets) -> String {
    format!("P{:.0} C{:.0} F{:.0}", m.protein(), m.carbs(), m.fat())
}

fn state_label(state: WindowState) -> &'static str {
    match state {
        WindowState::Upcoming => "upcoming",
        WindowState::Active => "active",
        WindowState::Consumed => "consumed",
        WindowState::Missed => "missed",
    }
}

pub fn trigger_line(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Overconsumption { percent_over } => format!("overconsumption ({percent_over:.0}% over)"),
        Trigger::Underconsumption { percent_under } => format!("underconsumption ({percent_under:.0}% under)"),
        Trigger::MissedWindow { window_id } => format!("missed window '{window_id}'"),
    }
}

pub fn plan_text(plan: &DayPlan, tz: Tz) -> String {
    let mut out = format!(
        "# {} (revision {}, budget {} kcal)\n",
        plan.day(),
        plan.revision(),
        plan.daily_budget().total_calories()
    );
    for w in plan.windows() {
        let target = w.effective_target();
        let mut line = format!(
            "{}-{}  {:<12} {:<16} {:<9} {:>5} kcal ({})",
            hhmm(w.start(), tz),
            hhmm(w.end(), tz),
            w.id(),
            w.purpose().label(),
            state_label(w.state()),
            target.total_calories(),
            grams(target),
        );
        if target != w.original_target() {
            line.push_str(&format!("  was {} kcal", w.original_target().total_calories()));
        }
        if w.state() == WindowState::Consumed {
            line.push_str(&format!("  eaten {} kcal", w.consumed().total_calories()));
        }
        out.push_str(&line);
        out.push('\n');
    }
    if let Some(bedtime) = plan.bedtime() {
        out.push_str(&format!("bedtime {}\n", hhmm(bedtime, tz)));
    }
    out
}

pub fn result_text(result: &RedistributionResult) -> String {
    let mut out = String::new();
    if result.is_preview {
        out.push_str("[preview]\n");
    }
    out.push_str(&format!("Trigger: {}\n", trigger_line(&result.trigger)));
    out.push_str(&result.explanation);
    out.push('\n');

    for adj in &result.adjusted_windows {
        out.push_str(&format!(
            "  {:<12} {:>5} -> {:>5} kcal ({})  {}\n",
            adj.window_id,
            adj.original_macros.total_calories(),
            adj.adjusted_macros.total_calories(),
            grams(&adj.adjusted_macros),
            adj.reason
        ));
    }
    out.push_str(&format!("Confidence: {:.2}\n", result.confidence_score));
    if let Some(tip) = &result.educational_tip {
        out.push_str(&format!("Tip: {tip}\n"));
    }
    out
}
