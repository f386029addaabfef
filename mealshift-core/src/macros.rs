//! Macro targets: protein / carbs / fat grams with derived calories.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Atwater factors (kcal per gram).
pub const PROTEIN_KCAL_PER_G: f64 = 4.0;
pub const CARBS_KCAL_PER_G: f64 = 4.0;
pub const FAT_KCAL_PER_G: f64 = 9.0;

/// Immutable macro amounts in grams.
///
/// All components are finite and `>= 0`; arithmetic returns new values and
/// clamps at zero instead of going negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MacroRecord")]
pub struct MacroTargets {
    protein: f64,
    carbs: f64,
    fat: f64,
}

/// Unvalidated wire shape for `MacroTargets`.
#[derive(Debug, Clone, Copy, Deserialize)]
struct MacroRecord {
    protein: f64,
    carbs: f64,
    fat: f64,
}

impl TryFrom<MacroRecord> for MacroTargets {
    type Error = ModelError;

    fn try_from(r: MacroRecord) -> Result<Self, Self::Error> {
        MacroTargets::new(r.protein, r.carbs, r.fat)
    }
}

fn check_grams(field: &'static str, value: f64) -> Result<f64, ModelError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ModelError::InvalidGrams { field, value })
    }
}

impl MacroTargets {
    pub fn new(protein: f64, carbs: f64, fat: f64) -> Result<Self, ModelError> {
        Ok(Self {
            protein: check_grams("protein", protein)?,
            carbs: check_grams("carbs", carbs)?,
            fat: check_grams("fat", fat)?,
        })
    }

    pub fn zero() -> Self {
        Self {
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        }
    }

    /// Internal constructor for values derived from already-valid inputs.
    fn clamped(protein: f64, carbs: f64, fat: f64) -> Self {
        let fix = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self {
            protein: fix(protein),
            carbs: fix(carbs),
            fat: fix(fat),
        }
    }

    pub fn protein(&self) -> f64 {
        self.protein
    }

    pub fn carbs(&self) -> f64 {
        self.carbs
    }

    pub fn fat(&self) -> f64 {
        self.fat
    }

    /// Unrounded calories.
    pub fn calories(&self) -> f64 {
        self.protein * PROTEIN_KCAL_PER_G + self.carbs * CARBS_KCAL_PER_G + self.fat * FAT_KCAL_PER_G
    }

    /// Calories rounded to the nearest integer.
    pub fn total_calories(&self) -> i64 {
        self.calories().round() as i64
    }

    /// Calories contributed by carbs and fat only.
    pub fn carb_fat_calories(&self) -> f64 {
        self.carbs * CARBS_KCAL_PER_G + self.fat * FAT_KCAL_PER_G
    }

    pub fn scale(&self, ratio: f64) -> Self {
        Self::clamped(self.protein * ratio, self.carbs * ratio, self.fat * ratio)
    }

    pub fn add(&self, other: &MacroTargets) -> Self {
        Self::clamped(
            self.protein + other.protein,
            self.carbs + other.carbs,
            self.fat + other.fat,
        )
    }

    pub fn saturating_sub(&self, other: &MacroTargets) -> Self {
        Self::clamped(
            self.protein - other.protein,
            self.carbs - other.carbs,
            self.fat - other.fat,
        )
    }

    /// Per-macro absolute difference.
    pub fn abs_diff(&self, other: &MacroTargets) -> Self {
        Self::clamped(
            (self.protein - other.protein).abs(),
            (self.carbs - other.carbs).abs(),
            (self.fat - other.fat).abs(),
        )
    }

    /// Whole-gram macros hitting `target_kcal` exactly where possible.
    ///
    /// Protein is kept at `protein` (rounded). The remaining calories are split
    /// between carbs and fat following `fat_kcal_share` (fat's share of the
    /// carb+fat calories), picking the fat gram count nearest the ideal for
    /// which the carb grams come out whole.
    pub fn solve_whole_grams(target_kcal: i64, protein: f64, fat_kcal_share: f64) -> Self {
        let protein = protein.round().max(0.0);
        let rest = target_kcal - (protein * PROTEIN_KCAL_PER_G) as i64;
        if rest <= 0 {
            return Self::clamped(protein, 0.0, 0.0);
        }

        let share = if fat_kcal_share.is_finite() {
            fat_kcal_share.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ideal_fat = rest as f64 * share / FAT_KCAL_PER_G;
        let center = ideal_fat.round() as i64;

        let mut candidates: Vec<i64> = (center - 2..=center + 2).filter(|f| *f >= 0).collect();
        candidates.sort_by(|a, b| {
            (*a as f64 - ideal_fat)
                .abs()
                .total_cmp(&(*b as f64 - ideal_fat).abs())
                .then_with(|| a.cmp(b))
        });

        for fat in candidates {
            let carb_kcal = rest - fat * FAT_KCAL_PER_G as i64;
            if carb_kcal >= 0 && carb_kcal % CARBS_KCAL_PER_G as i64 == 0 {
                return Self::clamped(protein, (carb_kcal / CARBS_KCAL_PER_G as i64) as f64, fat as f64);
            }
        }

        // Too little room for an exact split; get as close as whole grams allow.
        let fat = (center.max(0) as f64).min((rest as f64 / FAT_KCAL_PER_G).floor());
        let carbs = ((rest as f64 - fat * FAT_KCAL_PER_G) / CARBS_KCAL_PER_G).round();
        Self::clamped(protein, carbs, fat)
    }
}

impl Default for MacroTargets {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(p: f64, c: f64, f: f64) -> MacroTargets {
        MacroTargets::new(p, c, f).unwrap()
    }

    #[test]
    fn total_calories_uses_atwater_factors() {
        assert_eq!(m(40.0, 90.0, 20.0).total_calories(), 700);
        assert_eq!(m(0.5, 0.0, 0.0).total_calories(), 2);
    }

    #[test]
    fn rejects_negative_and_non_finite_grams() {
        assert!(matches!(
            MacroTargets::new(-1.0, 0.0, 0.0),
            Err(ModelError::InvalidGrams { field: "protein", .. })
        ));
        assert!(MacroTargets::new(0.0, f64::NAN, 0.0).is_err());
        assert!(MacroTargets::new(0.0, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn arithmetic_never_goes_negative() {
        let a = m(10.0, 20.0, 5.0);
        let b = m(30.0, 5.0, 10.0);
        let d = a.saturating_sub(&b);
        assert_eq!(d.protein(), 0.0);
        assert_eq!(d.carbs(), 15.0);
        assert_eq!(d.fat(), 0.0);

        let s = a.scale(-2.0);
        assert_eq!(s, MacroTargets::zero());
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = m(40.0, 90.0, 20.0);
        let b = m(40.0, 58.0, 12.0);
        assert_eq!(a.abs_diff(&b), b.abs_diff(&a));
        assert_eq!(a.abs_diff(&b), m(0.0, 32.0, 8.0));
    }

    #[test]
    fn solve_whole_grams_hits_target_exactly() {
        // 40p kept, 340 kcal split keeping roughly a third on fat.
        let out = MacroTargets::solve_whole_grams(500, 40.0, 1.0 / 3.0);
        assert_eq!(out, m(40.0, 58.0, 12.0));
        assert_eq!(out.total_calories(), 500);

        for target in 200..260 {
            let out = MacroTargets::solve_whole_grams(target, 20.0, 0.3);
            assert_eq!(out.total_calories(), target, "target {target}");
            assert_eq!(out.protein(), 20.0);
        }
    }

    #[test]
    fn solve_whole_grams_keeps_protein_when_no_room() {
        let out = MacroTargets::solve_whole_grams(100, 40.0, 0.5);
        assert_eq!(out, m(40.0, 0.0, 0.0));
    }

    #[test]
    fn deserialize_validates() {
        let ok: MacroTargets = serde_json::from_str(r#"{"protein":30,"carbs":50,"fat":20}"#).unwrap();
        assert_eq!(ok.total_calories(), 500);

        let bad = serde_json::from_str::<MacroTargets>(r#"{"protein":-3,"carbs":50,"fat":20}"#);
        assert!(bad.is_err());
    }
}
