use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mealshift_core::{
    DayPlan, DeviationClassifier, MacroTargets, RedistributionPlanner, RedistributionResult, Trigger,
    Window, WindowPurpose,
};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

fn m(p: f64, c: f64, f: f64) -> MacroTargets {
    MacroTargets::new(p, c, f).unwrap()
}

fn window(id: &str, start: u32, purpose: WindowPurpose, target: MacroTargets) -> Window {
    Window::new(id, id, at(start, 0), at(start + 2, 0), purpose, target).unwrap()
}

/// 2000 kcal over breakfast (600), lunch (700), dinner (700).
fn three_window_day(lunch: WindowPurpose, bedtime: Option<DateTime<Utc>>) -> DayPlan {
    DayPlan::new(
        day(),
        vec![
            window("w1", 7, WindowPurpose::SustainedEnergy, m(35.0, 70.0, 20.0)),
            window("w2", 12, lunch, m(40.0, 90.0, 20.0)),
            window("w3", 18, WindowPurpose::Recovery, m(40.0, 90.0, 20.0)),
        ],
        bedtime,
    )
    .unwrap()
}

fn run(plan: &DayPlan, now: DateTime<Utc>) -> RedistributionResult {
    let trigger = DeviationClassifier::new()
        .evaluate(plan.windows(), now)
        .expect("expected a trigger");
    RedistributionPlanner::new().plan(&trigger, plan.windows(), &plan.context())
}

/// Day total with adjusted targets applied and eaten amounts for closed windows.
fn day_total(result: &RedistributionResult) -> i64 {
    result
        .original_windows
        .iter()
        .map(|w| {
            if let Some(adj) = result.adjustment_for(w.id()) {
                adj.adjusted_macros.total_calories()
            } else if w.state().is_terminal() || result.source_window_id.as_deref() == Some(w.id()) {
                w.consumed().total_calories()
            } else {
                w.effective_target().total_calories()
            }
        })
        .sum()
}

fn assert_protein_floor(result: &RedistributionResult) {
    for adj in &result.adjusted_windows {
        let w = result
            .original_windows
            .iter()
            .find(|w| w.id() == adj.window_id)
            .unwrap();
        let floor = (0.70 * w.original_target().protein()).round();
        assert!(
            adj.adjusted_macros.protein() >= floor,
            "{} protein {} below floor {}",
            adj.window_id,
            adj.adjusted_macros.protein(),
            floor
        );
    }
}

fn loss(result: &RedistributionResult, id: &str) -> i64 {
    -result.adjustment_for(id).unwrap().calorie_delta()
}

#[test]
fn scenario_a_overconsumption_spreads_by_proximity() {
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, None);
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();

    let result = run(&plan, at(8, 30));
    match result.trigger {
        Trigger::Overconsumption { percent_over } => assert!((percent_over - 50.0).abs() < 1e-9),
        ref other => panic!("unexpected trigger {other:?}"),
    }

    assert_eq!(result.adjusted_windows.len(), 2);
    assert_eq!(loss(&result, "w2") + loss(&result, "w3"), 300);
    assert!(loss(&result, "w2") > loss(&result, "w3"));
    assert_eq!(result.adjustment_for("w2").unwrap().adjusted_macros.total_calories(), 500);
    assert_eq!(result.adjustment_for("w3").unwrap().adjusted_macros.total_calories(), 600);

    assert_eq!(result.confidence_score, 1.0);
    assert_eq!(result.unplaced_calories, 0);
    assert_eq!(day_total(&result), 2000);
    assert_protein_floor(&result);
    assert!(result.explanation.contains("50%"));
    assert!(result.educational_tip.is_some());
    result.validate().unwrap();
}

#[test]
fn scenario_a_reasons_and_totals() {
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, None);
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();
    let result = run(&plan, at(8, 30));

    for adj in &result.adjusted_windows {
        assert!(adj.reason.starts_with("Reduced due to earlier overconsumption"));
        assert!(adj.adjustment_ratio < 1.0);
        assert_eq!(adj.adjusted_macros.protein(), adj.original_macros.protein());
    }
    // Protein untouched, so every moved calorie came out of carbs and fat.
    let moved = result.total_redistributed;
    assert_eq!(moved.protein(), 0.0);
    assert_eq!(moved.carbs() * 4.0 + moved.fat() * 9.0, 300.0);
}

#[test]
fn scenario_b_post_workout_window_is_capped() {
    let mut plan = three_window_day(WindowPurpose::PostWorkout, None);
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();

    let result = run(&plan, at(8, 30));
    let w2 = loss(&result, "w2");
    let w3 = loss(&result, "w3");

    assert!(w2 as f64 <= 0.15 * 700.0);
    assert_eq!(w2, 105);
    assert_eq!(w3, 195);
    assert!(result.confidence_score < 1.0);
    assert!((result.confidence_score - 0.85).abs() < 1e-9);
    assert_eq!(day_total(&result), 2000);
    assert_protein_floor(&result);
}

#[test]
fn scenario_c_missed_window_moves_full_target() {
    let mut plan = DayPlan::new(
        day(),
        vec![
            window("w1", 7, WindowPurpose::SustainedEnergy, m(30.0, 50.0, 20.0)),
            window("w2", 12, WindowPurpose::Focus, m(40.0, 90.0, 20.0)),
            window("w3", 18, WindowPurpose::Recovery, m(45.0, 110.0, 20.0)),
        ],
        None,
    )
    .unwrap();
    plan.refresh(at(10, 0));

    let result = run(&plan, at(10, 0));
    assert_eq!(
        result.trigger,
        Trigger::MissedWindow {
            window_id: "w1".into()
        }
    );

    let w2 = result.adjustment_for("w2").unwrap().calorie_delta();
    let w3 = result.adjustment_for("w3").unwrap().calorie_delta();
    assert_eq!(w2 + w3, 500);
    assert!(w2 > w3);
    assert_eq!(day_total(&result), 2000);
    assert_eq!(result.confidence_score, 1.0);
    assert!(result.explanation.contains("was missed"));
    assert_protein_floor(&result);
}

#[test]
fn missed_window_fires_without_any_consumption() {
    let plan = three_window_day(WindowPurpose::SustainedEnergy, None);
    // Nothing refreshed or logged; the clock alone makes w1 missed.
    let trigger = DeviationClassifier::new().evaluate(plan.windows(), at(9, 30));
    assert_eq!(
        trigger,
        Some(Trigger::MissedWindow {
            window_id: "w1".into()
        })
    );
}

#[test]
fn scenario_d_last_window_deviation_is_a_noop() {
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, None);
    plan.log_meal("w1", m(35.0, 70.0, 20.0), at(8, 0)).unwrap();
    plan.log_meal("w2", m(40.0, 90.0, 20.0), at(13, 0)).unwrap();
    plan.log_meal("w3", m(50.0, 150.0, 20.0), at(19, 0)).unwrap();

    let result = run(&plan, at(19, 30));
    assert!(matches!(result.trigger, Trigger::Overconsumption { .. }));
    assert!(result.adjusted_windows.is_empty());
    assert!(result.is_noop());
    assert_eq!(result.confidence_score, 0.0);
    assert_eq!(result.total_redistributed, MacroTargets::zero());
    assert!(result.explanation.starts_with("No adjustment needed"));
}

#[test]
fn bedtime_buffer_excludes_last_window_from_additions() {
    let bedtime = Some(at(22, 0));
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, bedtime);
    plan.log_meal("w1", m(30.0, 45.0, 0.0), at(8, 0)).unwrap();

    let result = run(&plan, at(8, 30));
    assert!(matches!(result.trigger, Trigger::Underconsumption { .. }));
    assert!(result.adjustment_for("w3").is_none());
    assert_eq!(result.adjustment_for("w2").unwrap().calorie_delta(), 300);
    assert!((result.confidence_score - 0.85).abs() < 1e-9);
    assert_eq!(day_total(&result), 2000);
}

#[test]
fn bedtime_buffer_does_not_block_reductions() {
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, Some(at(22, 0)));
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();
    let result = run(&plan, at(8, 30));
    assert!(result.adjustment_for("w3").is_some());
    assert_eq!(result.confidence_score, 1.0);
}

#[test]
fn unplaceable_calories_lower_confidence() {
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, Some(at(22, 0)));
    // Lunch eaten early and on plan, then a light breakfast: only dinner is left.
    plan.log_meal("w2", m(40.0, 90.0, 20.0), at(7, 30)).unwrap();
    plan.log_meal("w1", m(30.0, 45.0, 0.0), at(8, 0)).unwrap();

    let result = run(&plan, at(8, 30));
    assert!(matches!(result.trigger, Trigger::Underconsumption { .. }));
    assert!(result.adjusted_windows.is_empty());
    assert_eq!(result.unplaced_calories, 300);
    assert!((result.confidence_score - 0.55).abs() < 1e-9);
    assert!(result.explanation.contains("300 kcal"));
}

#[test]
fn confidence_is_monotonic_in_violations() {
    let scenario = |lunch, bedtime| {
        let mut plan = three_window_day(lunch, bedtime);
        plan.log_meal("w1", m(30.0, 45.0, 0.0), at(8, 0)).unwrap();
        run(&plan, at(8, 30)).confidence_score
    };

    let clean = scenario(WindowPurpose::SustainedEnergy, None);
    let one = scenario(WindowPurpose::SustainedEnergy, Some(at(22, 0)));
    let two = scenario(WindowPurpose::PreWorkout, Some(at(22, 0)));

    assert_eq!(clean, 1.0);
    assert!(one <= clean);
    assert!(two <= one);
}

#[test]
fn planner_is_idempotent() {
    let mut plan = three_window_day(WindowPurpose::PostWorkout, Some(at(22, 0)));
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();

    let first = run(&plan, at(8, 30));
    let second = run(&plan, at(8, 30));
    assert_eq!(first, second);
}

#[test]
fn result_json_roundtrip_is_exact() {
    let mut plan = three_window_day(WindowPurpose::PostWorkout, None);
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();
    let result = run(&plan, at(8, 30));

    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"kind\":\"overconsumption\""));
    assert!(json.contains("\"confidence_score\":"));

    let back: RedistributionResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
    assert_eq!(back.confidence_score.to_bits(), result.confidence_score.to_bits());
}

#[test]
fn accepted_result_keeps_day_budget() {
    let mut plan = three_window_day(WindowPurpose::SustainedEnergy, None);
    plan.log_meal("w1", m(60.0, 120.0, 20.0), at(8, 0)).unwrap();
    let result = run(&plan, at(8, 30));
    plan.apply(&result).unwrap();

    let planned_ahead: i64 = plan
        .windows()
        .iter()
        .filter(|w| w.is_open())
        .map(|w| w.effective_target().total_calories())
        .sum();
    let eaten = plan.window("w1").unwrap().consumed().total_calories();
    assert_eq!(planned_ahead + eaten, plan.daily_budget().total_calories());
    assert!(plan.window("w1").unwrap().deviation_resolved());
}
