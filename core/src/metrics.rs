use crate::error::{PlanError, Result};
use crate::models::{ActivityLevel, Metrics, ProfileInput, Sex};

pub const MAX_HEIGHT_CM: f64 = 300.0;
pub const MAX_WEIGHT_KG: f64 = 500.0;

/// Constant added by Mifflin-St Jeor per sex. `Other` uses the midpoint of the
/// male and female constants.
#[must_use]
pub fn sex_offset(sex: Sex) -> f64 {
    match sex {
        Sex::Male => 5.0,
        Sex::Female => -161.0,
        Sex::Other => -78.0,
    }
}

fn validate_measurement(name: &str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PlanError::Validation(format!(
            "{name} must be a positive number (got {value})"
        )));
    }
    if value > max {
        return Err(PlanError::Validation(format!(
            "{name} must be at most {max} (got {value})"
        )));
    }
    Ok(())
}

/// BMI = kg / m².
pub fn calculate_bmi(height_cm: f64, weight_kg: f64) -> Result<f64> {
    validate_measurement("Height (cm)", height_cm, MAX_HEIGHT_CM)?;
    validate_measurement("Weight (kg)", weight_kg, MAX_WEIGHT_KG)?;
    let m = height_cm / 100.0;
    Ok(weight_kg / (m * m))
}

/// Mifflin-St Jeor: `10·kg + 6.25·cm − 5·age + s`.
pub fn calculate_bmr(height_cm: f64, weight_kg: f64, age: u32, sex: Sex) -> Result<f64> {
    validate_measurement("Height (cm)", height_cm, MAX_HEIGHT_CM)?;
    validate_measurement("Weight (kg)", weight_kg, MAX_WEIGHT_KG)?;
    Ok(10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age) + sex_offset(sex))
}

#[must_use]
pub fn calculate_tdee(bmr: f64, activity: ActivityLevel) -> f64 {
    bmr * activity.multiplier()
}

pub fn compute_metrics(input: &ProfileInput) -> Result<Metrics> {
    let bmi = calculate_bmi(input.height_cm, input.weight_kg)?;
    let bmr = calculate_bmr(
        input.height_cm,
        input.weight_kg,
        input.age_group.representative_age(),
        input.sex,
    )?;
    Ok(Metrics {
        weight_kg: input.weight_kg,
        height_cm: input.height_cm,
        bmi,
        bmr,
        activity_level: input.activity_level,
        tdee: calculate_tdee(bmr, input.activity_level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgeGroup;
    use proptest::prelude::*;

    fn input(sex: Sex, activity_level: ActivityLevel) -> ProfileInput {
        ProfileInput {
            age_group: AgeGroup::From26To35,
            sex,
            height_cm: 175.0,
            weight_kg: 75.0,
            activity_level,
        }
    }

    #[test]
    fn test_bmi() {
        let bmi = calculate_bmi(170.0, 70.0).unwrap();
        assert!((bmi - 24.221_453).abs() < 1e-5);
        assert_eq!(format!("{bmi:.1}"), "24.2");
    }

    #[test]
    fn test_bmr_and_tdee_male_moderate() {
        let m = compute_metrics(&input(Sex::Male, ActivityLevel::Moderate)).unwrap();
        // 750 + 1093.75 - 150 + 5
        assert!((m.bmr - 1698.75).abs() < 1e-9);
        assert!((m.tdee - 2633.0625).abs() < 1e-9);
        assert!((m.tdee - m.bmr * 1.55).abs() < 1e-9);
    }

    #[test]
    fn test_bmr_sex_offsets() {
        let male = calculate_bmr(175.0, 75.0, 30, Sex::Male).unwrap();
        let female = calculate_bmr(175.0, 75.0, 30, Sex::Female).unwrap();
        let other = calculate_bmr(175.0, 75.0, 30, Sex::Other).unwrap();
        assert!((male - female - 166.0).abs() < 1e-9);
        assert!((other - (male + female) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_measurements() {
        assert!(matches!(
            calculate_bmi(0.0, 70.0),
            Err(PlanError::Validation(_))
        ));
        assert!(calculate_bmi(170.0, -1.0).is_err());
        assert!(calculate_bmi(f64::NAN, 70.0).is_err());
        assert!(calculate_bmi(170.0, f64::INFINITY).is_err());
        assert!(calculate_bmr(301.0, 70.0, 30, Sex::Male).is_err());
        assert!(calculate_bmr(170.0, 501.0, 30, Sex::Male).is_err());

        let mut bad = input(Sex::Female, ActivityLevel::Light);
        bad.height_cm = 0.0;
        assert!(compute_metrics(&bad).is_err());
    }

    #[test]
    fn test_activity_multipliers() {
        let expected = [1.2, 1.375, 1.55, 1.725];
        for (level, mult) in ActivityLevel::ALL.iter().zip(expected) {
            assert!((calculate_tdee(1000.0, *level) - 1000.0 * mult).abs() < 1e-9);
        }
    }

    proptest! {
        #[test]
        fn prop_bmi_scales_inversely(
            height in 50.0f64..150.0,
            weight in 20.0f64..250.0,
        ) {
            let base = calculate_bmi(height, weight).unwrap();
            let doubled = calculate_bmi(height * 2.0, weight * 2.0).unwrap();
            prop_assert!((doubled - base / 2.0).abs() < 1e-9 * base.max(1.0));
        }

        #[test]
        fn prop_tdee_is_bmr_times_multiplier(
            height in 120.0f64..220.0,
            weight in 35.0f64..200.0,
            idx in 0usize..4,
        ) {
            let level = ActivityLevel::ALL[idx];
            let bmr = calculate_bmr(height, weight, 30, Sex::Female).unwrap();
            let tdee = calculate_tdee(bmr, level);
            prop_assert!((tdee - bmr * level.multiplier()).abs() < 1e-9);
        }
    }
}
