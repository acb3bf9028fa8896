use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitplan_core::models::NewProgressLog;
use fitplan_core::service::FitService;

use super::helpers::{check_mark, no_neg_zero, parse_date, today, weight_to_kg};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_log(
    svc: &FitService,
    user_id: &str,
    date: Option<String>,
    weight: Option<f64>,
    unit: &str,
    steps: Option<u32>,
    water: Option<u32>,
    json: bool,
) -> Result<()> {
    let weight_kg = weight.map(|w| weight_to_kg(w, unit)).transpose()?;
    let entry = NewProgressLog {
        date: Some(parse_date(date)?),
        weight_kg,
        steps,
        water_ml: water,
    };
    let log = svc.log_progress(user_id, &entry, today())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        let mut parts = Vec::new();
        if let Some(kg) = log.weight_kg {
            parts.push(format!("{kg:.1} kg"));
        }
        if let Some(s) = log.steps {
            parts.push(format!("{s} steps"));
        }
        if let Some(ml) = log.water_ml {
            parts.push(format!("{ml} ml water"));
        }
        println!("Logged {} for {}", parts.join(", "), log.date.format("%Y-%m-%d"));
    }
    Ok(())
}

pub(crate) fn cmd_progress(svc: &FitService, user_id: &str, days: u32, json: bool) -> Result<()> {
    let summary = svc.progress_summary(user_id, days, today())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meals")]
        meals: u32,
        #[tabled(rename = "Workout")]
        workout: String,
        #[tabled(rename = "Water")]
        water: String,
        #[tabled(rename = "Steps")]
        steps: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Score")]
        score: u32,
        #[tabled(rename = "Streak")]
        streak: u32,
    }

    #[derive(Tabled)]
    struct WeekRow {
        #[tabled(rename = "Week")]
        week: String,
        #[tabled(rename = "Workouts")]
        workouts: u32,
        #[tabled(rename = "Minutes")]
        minutes: u32,
        #[tabled(rename = "Meals")]
        meals: u32,
        #[tabled(rename = "Avg Water")]
        water: String,
        #[tabled(rename = "Steps")]
        steps: u64,
        #[tabled(rename = "Weight")]
        weight: String,
    }

    let day_rows: Vec<DayRow> = summary
        .days
        .iter()
        .map(|d| DayRow {
            date: d.date.format("%a %m-%d").to_string(),
            meals: d.meals_completed,
            workout: if d.workout_completed {
                format!("{} min", d.workout_minutes)
            } else {
                "-".to_string()
            },
            water: format!("[{}]", check_mark(d.water_goal_completed)),
            steps: d.steps.map_or("-".into(), |s| s.to_string()),
            weight: d
                .weight_kg
                .map_or("-".into(), |w| format!("{:.1}", no_neg_zero(w))),
            score: d.fitness_score,
            streak: d.streak_current,
        })
        .collect();

    let week_rows: Vec<WeekRow> = summary
        .weeks
        .iter()
        .map(|w| WeekRow {
            week: format!("{}-W{:02}", w.iso_year, w.iso_week),
            workouts: w.workouts,
            minutes: w.workout_minutes,
            meals: w.meals_completed,
            water: format!("{:.0} ml", w.avg_daily_water_ml),
            steps: w.total_steps,
            weight: w.latest_weight_kg.map_or("-".into(), |kg| format!("{kg:.1}")),
        })
        .collect();

    println!(
        "\n  Progress {} to {}\n",
        summary.start.format("%Y-%m-%d"),
        summary.end.format("%Y-%m-%d")
    );
    println!(
        "{}",
        Table::new(&day_rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..8)).with(Alignment::right()))
    );
    println!(
        "{}",
        Table::new(&week_rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..7)).with(Alignment::right()))
    );

    let t = &summary.totals;
    println!(
        "\n  {} workouts ({} min), {} meals, {} qualifying days",
        t.workouts, t.workout_minutes, t.meals_completed, t.qualifying_days
    );
    println!(
        "  Streak: {} current, {} best",
        summary.streak_current, summary.streak_max
    );
    Ok(())
}
