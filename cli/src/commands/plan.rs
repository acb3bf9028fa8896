use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitplan_core::models::{PlanRecord, WorkoutSection};
use fitplan_core::service::FitService;

use super::helpers::{no_neg_zero, parse_date, truncate};

pub(crate) fn cmd_plan(
    svc: &FitService,
    user_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let record = svc.plan_for_date(user_id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_plan(&record);
    }
    Ok(())
}

fn print_plan(record: &PlanRecord) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Meal")]
        slot: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let plan = &record.plan;
    println!("\n  Plan for {}\n", plan.date.format("%A, %Y-%m-%d"));

    let rows: Vec<MealRow> = plan
        .meals
        .iter()
        .map(|m| MealRow {
            time: m.time.format("%H:%M").to_string(),
            slot: m.slot.to_string(),
            name: if m.fallback {
                format!("{} *", truncate(&m.name, 33))
            } else {
                truncate(&m.name, 35)
            },
            calories: format!("{:.0}", no_neg_zero(m.calories)),
            protein: format!("{:.1}g", no_neg_zero(m.protein_g)),
            carbs: format!("{:.1}g", no_neg_zero(m.carbs_g)),
            fat: format!("{:.1}g", no_neg_zero(m.fat_g)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    println!(
        "\n  Target: {:.0} kcal  |  P {:.0}g  C {:.0}g  F {:.0}g",
        plan.calories_target, plan.macros.protein_g, plan.macros.carbs_g, plan.macros.fat_g
    );
    if plan.meals.iter().any(|m| m.fallback) {
        println!("  * default meal used; no template matched your diet and allergies");
    }

    let w = &plan.workout;
    println!(
        "\n  {} Workout: {} at {} ({} min, ~{} kcal)",
        w.kind.label(),
        w.name,
        w.scheduled_at.format("%H:%M"),
        w.duration_minutes,
        w.calories_burned
    );
    for section in &w.sections {
        println!("    {}", section_line(section));
    }

    println!("\n  Water:  {} ml", plan.water_goal_ml);
    println!(
        "  Sleep:  {} - {} ({:.1} h)",
        plan.sleep.bed_time.format("%H:%M"),
        plan.sleep.wake_time.format("%H:%M"),
        plan.sleep.hours
    );
    println!("  Steps:  {}", plan.step_target);
}

fn section_line(s: &WorkoutSection) -> String {
    let mut line = format!("{}: {}", s.name, s.exercises.join(", "));
    match (s.sets, &s.reps, s.duration_minutes) {
        (Some(sets), Some(reps), _) => line.push_str(&format!(" ({sets} x {reps})")),
        (_, _, Some(min)) => line.push_str(&format!(" ({min} min)")),
        _ => {}
    }
    line
}

fn join_or<T: ToString>(items: &[T], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) fn cmd_templates(svc: &FitService, json: bool) -> Result<()> {
    let lib = svc.templates();
    if json {
        println!("{}", serde_json::to_string_pretty(lib)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct MealTemplateRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Slot")]
        slot: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "Diets")]
        diets: String,
        #[tabled(rename = "Allergens")]
        allergens: String,
    }

    #[derive(Tabled)]
    struct WorkoutTemplateRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Min")]
        minutes: u32,
        #[tabled(rename = "Equipment")]
        equipment: String,
        #[tabled(rename = "Goals")]
        goals: String,
    }

    let meals: Vec<MealTemplateRow> = lib
        .meals
        .iter()
        .map(|m| MealTemplateRow {
            id: if m.default {
                format!("{} (default)", m.id)
            } else {
                m.id.clone()
            },
            slot: m.slot.to_string(),
            name: truncate(&m.name, 30),
            calories: format!("{:.0}", m.calories),
            diets: join_or(&m.diets, "any"),
            allergens: join_or(&m.allergens, "-"),
        })
        .collect();

    let workouts: Vec<WorkoutTemplateRow> = lib
        .workouts
        .iter()
        .map(|w| WorkoutTemplateRow {
            id: if w.default {
                format!("{} (default)", w.id)
            } else {
                w.id.clone()
            },
            kind: w.kind.label().to_string(),
            name: truncate(&w.name, 30),
            minutes: w.duration_minutes,
            equipment: join_or(&w.equipment, "any"),
            goals: join_or(&w.goals, "any"),
        })
        .collect();

    println!(
        "{}",
        Table::new(&meals)
            .with(Style::rounded())
            .with(Modify::new(Columns::single(3)).with(Alignment::right()))
    );
    println!(
        "{}",
        Table::new(&workouts)
            .with(Style::rounded())
            .with(Modify::new(Columns::single(3)).with(Alignment::right()))
    );
    Ok(())
}
