use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use fitplan_core::models::{OnboardingAnswers, Profile};
use fitplan_core::service::FitService;

use super::helpers::today;

fn read_answers(path: &Path) -> Result<OnboardingAnswers> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read answers from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Invalid onboarding answers JSON")
}

pub(crate) fn cmd_onboard(svc: &FitService, user_id: &str, file: &Path, json: bool) -> Result<()> {
    let answers = read_answers(file)?;
    let profile = svc.submit_onboarding(user_id, &answers, today())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Onboarding saved for {}.", profile.full_name);
        print_profile(&profile);
        println!("\nRun `fitplan plan` to see today's plan.");
    }
    Ok(())
}

pub(crate) fn cmd_profile(svc: &FitService, user_id: &str, json: bool) -> Result<()> {
    let profile = svc.get_profile(user_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print_profile(&profile);
    }
    Ok(())
}

fn print_profile(p: &Profile) {
    let m = &p.metrics;
    let t = &p.targets;
    println!(
        "\n{} ({}, {}, {:.0} cm, {:.1} kg)",
        p.full_name,
        p.input.age_group,
        p.input.sex,
        m.height_cm,
        m.weight_kg
    );
    println!("  BMI:       {:.1}", m.bmi);
    println!("  BMR:       {:.0} kcal", m.bmr);
    println!("  TDEE:      {:.0} kcal ({})", m.tdee, m.activity_level.as_str());
    println!("  Goal:      {}", p.lifestyle.goal.as_str());
    println!("  Calories:  {:.0} kcal", t.calories);
    println!(
        "  Macros:    P {:.0}g ({}%)  C {:.0}g ({}%)  F {:.0}g ({}%)",
        t.macros.protein_g,
        t.split.protein_pct,
        t.macros.carbs_g,
        t.split.carbs_pct,
        t.macros.fat_g,
        t.split.fat_pct
    );
    println!("  Water:     {} ml", t.water_ml);
    println!("  Sleep:     {:.1} h", t.sleep_hours);
    println!("  Steps:     {}", t.steps);
}
