use chrono::NaiveTime;

use crate::models::{DailyPlan, NewTask, TaskKind};

/// Fixed evening reminder for the hydration task.
#[must_use]
pub fn water_reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default()
}

/// Turn a plan into checklist items: one per meal, then workout, water and
/// sleep. Keys are derived from the plan alone, so materializing the same
/// plan twice yields the same keys and the store can ignore the repeats.
#[must_use]
pub fn materialize_tasks(plan: &DailyPlan) -> Vec<NewTask> {
    let mut tasks: Vec<NewTask> = plan
        .meals
        .iter()
        .map(|meal| NewTask {
            key: format!("meal-{}", meal.slot),
            kind: TaskKind::Meal,
            title: format!("{} ({:.0} kcal)", meal.name, meal.calories),
            due_at: meal.time,
            duration_minutes: None,
        })
        .collect();

    let workout = &plan.workout;
    tasks.push(NewTask {
        key: "workout".to_string(),
        kind: TaskKind::Workout,
        title: format!(
            "{} Workout ({} min)",
            workout.kind.label(),
            workout.duration_minutes
        ),
        due_at: workout.scheduled_at,
        duration_minutes: Some(workout.duration_minutes),
    });

    tasks.push(NewTask {
        key: "water".to_string(),
        kind: TaskKind::Water,
        title: format!("Drink {}ml water", plan.water_goal_ml),
        due_at: water_reminder_time(),
        duration_minutes: None,
    });

    tasks.push(NewTask {
        key: "sleep".to_string(),
        kind: TaskKind::Sleep,
        title: format!("Sleep by {}", plan.sleep.bed_time.format("%H:%M")),
        due_at: plan.sleep.bed_time,
        duration_minutes: None,
    });

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::generate_plan;
    use crate::plan::tests::{sample_prefs, sample_targets};
    use crate::models::parse_time;
    use crate::templates::TemplateLibrary;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn sample_plan() -> DailyPlan {
        generate_plan(
            &sample_targets(2000.0),
            &sample_prefs(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            &TemplateLibrary::builtin(),
        )
        .unwrap()
    }

    #[test]
    fn test_one_task_per_plan_item() {
        let plan = sample_plan();
        let tasks = materialize_tasks(&plan);
        assert_eq!(tasks.len(), 7);
        assert_eq!(tasks.iter().filter(|t| t.kind == TaskKind::Meal).count(), 4);
        assert_eq!(tasks.iter().filter(|t| t.kind == TaskKind::Workout).count(), 1);
        assert_eq!(tasks.iter().filter(|t| t.kind == TaskKind::Water).count(), 1);
        assert_eq!(tasks.iter().filter(|t| t.kind == TaskKind::Sleep).count(), 1);
    }

    #[test]
    fn test_titles_and_due_times() {
        let plan = sample_plan();
        let tasks = materialize_tasks(&plan);

        let breakfast = &tasks[0];
        assert_eq!(breakfast.key, "meal-breakfast");
        assert_eq!(breakfast.title, format!("{} (500 kcal)", plan.meals[0].name));
        assert_eq!(breakfast.due_at, parse_time("07:30").unwrap());

        let workout = tasks.iter().find(|t| t.key == "workout").unwrap();
        assert_eq!(workout.title, "Home Workout (30 min)");
        assert_eq!(workout.due_at, parse_time("18:00").unwrap());
        assert_eq!(workout.duration_minutes, Some(30));

        let water = tasks.iter().find(|t| t.key == "water").unwrap();
        assert_eq!(water.title, "Drink 3000ml water");
        assert_eq!(water.due_at, parse_time("20:00").unwrap());

        let sleep = tasks.iter().find(|t| t.key == "sleep").unwrap();
        assert_eq!(sleep.title, "Sleep by 22:30");
        assert_eq!(sleep.due_at, parse_time("22:30").unwrap());
    }

    #[test]
    fn test_keys_unique_and_stable() {
        let plan = sample_plan();
        let first = materialize_tasks(&plan);
        let keys: HashSet<&str> = first.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys.len(), first.len());
        assert_eq!(first, materialize_tasks(&plan));
    }
}
