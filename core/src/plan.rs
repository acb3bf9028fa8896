use chrono::{Datelike, NaiveDate, NaiveTime};
use tracing::warn;

use crate::error::{PlanError, Result};
use crate::models::{DailyPlan, Meal, MealSlot, PlanPreferences, SleepWindow, Targets, Workout};
use crate::templates::{MealTemplate, TemplateLibrary, WorkoutTemplate};

const MAX_SUGGESTIONS: usize = 3;

/// Share of the daily calorie target and serving time for each slot.
#[must_use]
pub fn slot_schedule(slot: MealSlot) -> (f64, NaiveTime) {
    let (share, h, m) = match slot {
        MealSlot::Breakfast => (0.25, 7, 30),
        MealSlot::Lunch => (0.35, 12, 30),
        MealSlot::Snack => (0.10, 16, 0),
        MealSlot::Dinner => (0.30, 19, 0),
    };
    (share, NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default())
}

/// Index into a candidate list that advances by one each calendar day.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn rotation_index(date: NaiveDate, len: usize) -> usize {
    date.num_days_from_ce().rem_euclid(len as i32) as usize
}

fn pick_meal<'a>(
    library: &'a TemplateLibrary,
    slot: MealSlot,
    prefs: &PlanPreferences,
    date: NaiveDate,
) -> Result<(&'a MealTemplate, Vec<String>)> {
    let candidates = library.meal_candidates(slot, prefs.diet, &prefs.allergies);
    if candidates.is_empty() {
        return Err(PlanError::NotFound(format!(
            "no {slot} template for {} diet excluding {:?}",
            prefs.diet, prefs.allergies
        )));
    }
    let idx = rotation_index(date, candidates.len());
    let suggestions = (1..candidates.len())
        .map(|offset| candidates[(idx + offset) % candidates.len()].name.clone())
        .take(MAX_SUGGESTIONS)
        .collect();
    Ok((candidates[idx], suggestions))
}

fn build_meal(
    template: &MealTemplate,
    slot: MealSlot,
    calories_target: f64,
    suggestions: Vec<String>,
    fallback: bool,
) -> Meal {
    let (share, time) = slot_schedule(slot);
    let calories = calories_target * share;
    let scale = calories / template.calories;
    Meal {
        slot,
        template_id: template.id.clone(),
        name: template.name.clone(),
        time,
        calories,
        protein_g: template.protein_g * scale,
        carbs_g: template.carbs_g * scale,
        fat_g: template.fat_g * scale,
        suggestions,
        fallback,
    }
}

fn generate_meal(
    library: &TemplateLibrary,
    slot: MealSlot,
    targets: &Targets,
    prefs: &PlanPreferences,
    date: NaiveDate,
) -> Result<Meal> {
    match pick_meal(library, slot, prefs, date) {
        Ok((template, suggestions)) => Ok(build_meal(
            template,
            slot,
            targets.calories,
            suggestions,
            false,
        )),
        Err(PlanError::NotFound(reason)) => {
            let template = library.default_meal(slot).ok_or_else(|| {
                PlanError::NotFound(format!("{reason}, and no default {slot} template"))
            })?;
            warn!(%slot, %reason, template = %template.id, "falling back to default meal template");
            Ok(build_meal(template, slot, targets.calories, Vec::new(), true))
        }
        Err(e) => Err(e),
    }
}

fn build_workout(template: &WorkoutTemplate, prefs: &PlanPreferences, fallback: bool) -> Workout {
    Workout {
        template_id: template.id.clone(),
        name: template.name.clone(),
        kind: template.kind,
        scheduled_at: prefs.workout_time.start(),
        duration_minutes: template.duration_minutes,
        calories_burned: template.calories_burned,
        sections: template.sections.clone(),
        fallback,
    }
}

fn generate_workout(
    library: &TemplateLibrary,
    prefs: &PlanPreferences,
    date: NaiveDate,
) -> Result<Workout> {
    if !prefs.is_training_day(date.weekday()) {
        if let Some(recovery) = library.recovery_workout() {
            return Ok(build_workout(recovery, prefs, false));
        }
    }

    let candidates = library.workout_candidates(prefs.equipment, prefs.goal);
    if candidates.is_empty() {
        let template = library.default_workout().ok_or_else(|| {
            PlanError::NotFound(format!(
                "no workout template for {:?} / {} and no default",
                prefs.equipment, prefs.goal
            ))
        })?;
        warn!(
            equipment = ?prefs.equipment,
            goal = %prefs.goal,
            template = %template.id,
            "falling back to default workout template"
        );
        return Ok(build_workout(template, prefs, true));
    }
    let template = candidates[rotation_index(date, candidates.len())];
    Ok(build_workout(template, prefs, false))
}

/// Build the plan for one date. Pure: the same targets, preferences, date and
/// library always give the same plan.
pub fn generate_plan(
    targets: &Targets,
    prefs: &PlanPreferences,
    date: NaiveDate,
    library: &TemplateLibrary,
) -> Result<DailyPlan> {
    if !targets.calories.is_finite() || targets.calories <= 0.0 {
        return Err(PlanError::Validation(format!(
            "Calorie target must be positive (got {})",
            targets.calories
        )));
    }

    let meals = MealSlot::ALL
        .iter()
        .map(|slot| generate_meal(library, *slot, targets, prefs, date))
        .collect::<Result<Vec<_>>>()?;

    Ok(DailyPlan {
        date,
        meals,
        workout: generate_workout(library, prefs, date)?,
        water_goal_ml: targets.water_ml,
        sleep: SleepWindow::new(prefs.bed_time, prefs.wake_time),
        step_target: targets.steps,
        calories_target: targets.calories,
        macros: targets.macros,
    })
}
