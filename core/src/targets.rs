use crate::error::{PlanError, Result};
use crate::models::{
    ActivityLevel, DietType, Lifestyle, MacroSplit, MacroTargets, Metrics, PrimaryGoal,
    SleepHabit, StepsHabit, Targets,
};

pub const MIN_WATER_ML: f64 = 1800.0;
pub const WATER_ML_PER_KG: f64 = 32.0;
pub const MIN_SLEEP_HOURS: f64 = 7.0;
pub const MAX_SLEEP_HOURS: f64 = 9.0;

/// Calorie target as a fraction of TDEE: a 15% deficit or surplus.
#[must_use]
pub fn calorie_factor(goal: PrimaryGoal) -> f64 {
    match goal {
        PrimaryGoal::LoseWeight => 0.85,
        PrimaryGoal::GainMuscle => 1.15,
        PrimaryGoal::Maintain | PrimaryGoal::ImproveStamina => 1.0,
    }
}

/// Protein/carb/fat percentages. A high-protein diet overrides the goal split.
#[must_use]
pub fn macro_split(goal: PrimaryGoal, diet: DietType) -> MacroSplit {
    let (protein_pct, carbs_pct, fat_pct) = if diet == DietType::HighProtein {
        (35, 40, 25)
    } else {
        match goal {
            PrimaryGoal::LoseWeight => (30, 40, 30),
            PrimaryGoal::GainMuscle => (30, 45, 25),
            PrimaryGoal::Maintain => (25, 50, 25),
            PrimaryGoal::ImproveStamina => (20, 55, 25),
        }
    };
    MacroSplit {
        protein_pct,
        carbs_pct,
        fat_pct,
    }
}

pub fn validate_macro_split(split: &MacroSplit) -> Result<()> {
    let MacroSplit {
        protein_pct: protein,
        carbs_pct: carbs,
        fat_pct: fat,
    } = *split;
    if protein < 0 || carbs < 0 || fat < 0 {
        return Err(PlanError::validation("Macro percentages must be non-negative"));
    }
    if protein > 100 || carbs > 100 || fat > 100 {
        return Err(PlanError::validation(
            "Each macro percentage must be between 0 and 100",
        ));
    }
    let sum = protein + carbs + fat;
    if sum != 100 {
        return Err(PlanError::Validation(format!(
            "Macro percentages must sum to 100 (got {sum})"
        )));
    }
    Ok(())
}

/// Protein and carbs carry 4 kcal/g, fat 9 kcal/g.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn macro_grams(calories: f64, split: &MacroSplit) -> MacroTargets {
    MacroTargets {
        protein_g: calories * split.protein_pct as f64 / 100.0 / 4.0,
        carbs_g: calories * split.carbs_pct as f64 / 100.0 / 4.0,
        fat_g: calories * split.fat_pct as f64 / 100.0 / 9.0,
    }
}

#[must_use]
pub fn activity_water_bonus_ml(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 250.0,
        ActivityLevel::Light => 500.0,
        ActivityLevel::Moderate => 750.0,
        ActivityLevel::VeryActive => 1000.0,
    }
}

#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn water_target_ml(weight_kg: f64, level: ActivityLevel) -> u32 {
    let base = (WATER_ML_PER_KG * weight_kg).max(MIN_WATER_ML);
    (base + activity_water_bonus_ml(level)).round() as u32
}

#[must_use]
pub fn sleep_target_hours(habit: SleepHabit) -> f64 {
    let hours = match habit {
        SleepHabit::Under5h => 7.0,
        SleepHabit::From5To7h => 7.5,
        SleepHabit::From7To9h => 8.0,
        SleepHabit::Over9h => 9.0,
    };
    f64::clamp(hours, MIN_SLEEP_HOURS, MAX_SLEEP_HOURS)
}

#[must_use]
pub fn step_target(habit: StepsHabit) -> u32 {
    match habit {
        StepsHabit::Under3k => 6000,
        StepsHabit::From3kTo6k => 8000,
        StepsHabit::From6kTo10k => 10000,
        StepsHabit::Over10k => 12000,
    }
}

pub fn compute_targets(metrics: &Metrics, lifestyle: &Lifestyle) -> Result<Targets> {
    if !metrics.tdee.is_finite() || metrics.tdee <= 0.0 {
        return Err(PlanError::Validation(format!(
            "TDEE must be positive (got {})",
            metrics.tdee
        )));
    }
    let calories = metrics.tdee * calorie_factor(lifestyle.goal);
    let split = macro_split(lifestyle.goal, lifestyle.diet);
    validate_macro_split(&split)?;

    Ok(Targets {
        calories,
        split,
        macros: macro_grams(calories, &split),
        water_ml: water_target_ml(metrics.weight_kg, metrics.activity_level),
        sleep_hours: sleep_target_hours(lifestyle.sleep_habit),
        steps: step_target(lifestyle.steps_habit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(tdee: f64, weight_kg: f64) -> Metrics {
        Metrics {
            weight_kg,
            height_cm: 175.0,
            bmi: 24.5,
            bmr: tdee / 1.55,
            activity_level: ActivityLevel::Moderate,
            tdee,
        }
    }

    fn lifestyle(goal: PrimaryGoal, diet: DietType) -> Lifestyle {
        Lifestyle {
            goal,
            diet,
            steps_habit: StepsHabit::From3kTo6k,
            sleep_habit: SleepHabit::From7To9h,
        }
    }

    #[test]
    fn test_lose_weight_targets() {
        let t = compute_targets(
            &metrics(2000.0, 75.0),
            &lifestyle(PrimaryGoal::LoseWeight, DietType::Balanced),
        )
        .unwrap();
        assert!((t.calories - 1700.0).abs() < 1e-9);
        assert!((t.macros.protein_g - 127.5).abs() < 1e-9);
        assert!((t.macros.carbs_g - 170.0).abs() < 1e-9);
        assert!((t.macros.fat_g - 1700.0 * 0.3 / 9.0).abs() < 1e-9);
        // 32 * 75 = 2400, plus moderate bonus
        assert_eq!(t.water_ml, 3150);
        assert!((t.sleep_hours - 8.0).abs() < f64::EPSILON);
        assert_eq!(t.steps, 8000);
    }

    #[test]
    fn test_gain_and_maintain_calories() {
        let m = metrics(2000.0, 75.0);
        let gain = compute_targets(&m, &lifestyle(PrimaryGoal::GainMuscle, DietType::NonVeg)).unwrap();
        assert!((gain.calories - 2300.0).abs() < 1e-9);
        let keep = compute_targets(&m, &lifestyle(PrimaryGoal::Maintain, DietType::Balanced)).unwrap();
        assert!((keep.calories - 2000.0).abs() < 1e-9);
        let stamina =
            compute_targets(&m, &lifestyle(PrimaryGoal::ImproveStamina, DietType::Balanced)).unwrap();
        assert_eq!(stamina.split.carbs_pct, 55);
    }

    #[test]
    fn test_high_protein_overrides_split() {
        let split = macro_split(PrimaryGoal::Maintain, DietType::HighProtein);
        assert_eq!(split.protein_pct, 35);
        assert!(validate_macro_split(&split).is_ok());
    }

    #[test]
    fn test_every_split_sums_to_100() {
        let goals = [
            PrimaryGoal::LoseWeight,
            PrimaryGoal::GainMuscle,
            PrimaryGoal::Maintain,
            PrimaryGoal::ImproveStamina,
        ];
        let diets = [
            DietType::Balanced,
            DietType::HighJunk,
            DietType::Vegetarian,
            DietType::NonVeg,
            DietType::HighProtein,
        ];
        for goal in goals {
            for diet in diets {
                assert!(validate_macro_split(&macro_split(goal, diet)).is_ok());
            }
        }
    }

    #[test]
    fn test_validate_macro_split_rejects() {
        let bad = MacroSplit {
            protein_pct: 50,
            carbs_pct: 50,
            fat_pct: 10,
        };
        assert!(validate_macro_split(&bad).is_err());
        let neg = MacroSplit {
            protein_pct: -10,
            carbs_pct: 60,
            fat_pct: 50,
        };
        assert!(validate_macro_split(&neg).is_err());
    }

    #[test]
    fn test_macro_grams_account_for_all_calories() {
        let split = macro_split(PrimaryGoal::GainMuscle, DietType::Balanced);
        let g = macro_grams(2400.0, &split);
        let kcal = g.protein_g * 4.0 + g.carbs_g * 4.0 + g.fat_g * 9.0;
        assert!((kcal - 2400.0).abs() < 1e-6);
    }

    #[test]
    fn test_water_floor_and_bonus() {
        // 32 * 40 = 1280, below the floor
        assert_eq!(water_target_ml(40.0, ActivityLevel::Sedentary), 2050);
        assert_eq!(water_target_ml(100.0, ActivityLevel::VeryActive), 4200);
    }

    #[test]
    fn test_sleep_stays_in_band() {
        for habit in [
            SleepHabit::Under5h,
            SleepHabit::From5To7h,
            SleepHabit::From7To9h,
            SleepHabit::Over9h,
        ] {
            let h = sleep_target_hours(habit);
            assert!((MIN_SLEEP_HOURS..=MAX_SLEEP_HOURS).contains(&h));
        }
    }

    #[test]
    fn test_rejects_non_positive_tdee() {
        let m = metrics(0.0, 70.0);
        assert!(matches!(
            compute_targets(&m, &lifestyle(PrimaryGoal::Maintain, DietType::Balanced)),
            Err(PlanError::Validation(_))
        ));
    }
}
