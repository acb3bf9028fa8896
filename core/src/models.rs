use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Lowercase, trim, and fold spaces and hyphens to underscores so that
/// questionnaire labels ("Very Active", "Non-veg") and snake keys compare equal.
fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

fn invalid(field: &str, value: &str, allowed: &[&str]) -> PlanError {
    PlanError::Validation(format!(
        "Invalid {field} '{value}'. Must be one of: {}",
        allowed.join(", ")
    ))
}

/// `HH:MM` (de)serialization for wall-clock times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| PlanError::Validation(format!("Invalid time '{s}'. Expected HH:MM")))
}

// --- Questionnaire enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl FromStr for Sex {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "other" | "non_binary" | "nonbinary" | "prefer_not_to_say" => Ok(Self::Other),
            _ => Err(invalid("gender", s, &["male", "female", "other"])),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "18-25")]
    From18To25,
    #[serde(rename = "26-35")]
    From26To35,
    #[serde(rename = "36-45")]
    From36To45,
    #[serde(rename = "46+")]
    Over46,
}

impl AgeGroup {
    /// Representative age used by the BMR formula.
    #[must_use]
    pub fn representative_age(self) -> u32 {
        match self {
            Self::From18To25 => 22,
            Self::From26To35 => 30,
            Self::From36To45 => 40,
            Self::Over46 => 50,
        }
    }
}

impl FromStr for AgeGroup {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "18_25" => Ok(Self::From18To25),
            "26_35" => Ok(Self::From26To35),
            "36_45" => Ok(Self::From36To45),
            "46+" | "46_plus" | "46" => Ok(Self::Over46),
            _ => Err(invalid("age group", s, &["18-25", "26-35", "36-45", "46+"])),
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::From18To25 => "18-25",
            Self::From26To35 => "26-35",
            Self::From36To45 => "36-45",
            Self::Over46 => "46+",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 4] = [
        Self::Sedentary,
        Self::Light,
        Self::Moderate,
        Self::VeryActive,
    ];

    /// TDEE multiplier applied to BMR.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::VeryActive => 1.725,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::VeryActive => "very_active",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "sedentary" => Ok(Self::Sedentary),
            "light" | "lightly_active" => Ok(Self::Light),
            "moderate" | "moderately_active" => Ok(Self::Moderate),
            "very_active" | "active" => Ok(Self::VeryActive),
            _ => Err(invalid(
                "activity level",
                s,
                &["sedentary", "light", "moderate", "very_active"],
            )),
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryGoal {
    LoseWeight,
    GainMuscle,
    Maintain,
    ImproveStamina,
}

impl PrimaryGoal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoseWeight => "lose_weight",
            Self::GainMuscle => "gain_muscle",
            Self::Maintain => "maintain",
            Self::ImproveStamina => "improve_stamina",
        }
    }
}

impl FromStr for PrimaryGoal {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "lose_weight" | "lose" | "weight_loss" => Ok(Self::LoseWeight),
            "gain_muscle" | "gain" | "muscle_gain" => Ok(Self::GainMuscle),
            "maintain" | "maintenance" => Ok(Self::Maintain),
            "improve_stamina" | "stamina" => Ok(Self::ImproveStamina),
            _ => Err(invalid(
                "primary goal",
                s,
                &["lose_weight", "gain_muscle", "maintain", "improve_stamina"],
            )),
        }
    }
}

impl fmt::Display for PrimaryGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietType {
    Balanced,
    HighJunk,
    Vegetarian,
    NonVeg,
    HighProtein,
}

impl DietType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::HighJunk => "high_junk",
            Self::Vegetarian => "vegetarian",
            Self::NonVeg => "non_veg",
            Self::HighProtein => "high_protein",
        }
    }
}

impl FromStr for DietType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "balanced" => Ok(Self::Balanced),
            "high_junk" | "junk" => Ok(Self::HighJunk),
            "vegetarian" | "veg" => Ok(Self::Vegetarian),
            "non_veg" | "nonveg" | "non_vegetarian" => Ok(Self::NonVeg),
            "high_protein" => Ok(Self::HighProtein),
            _ => Err(invalid(
                "diet type",
                s,
                &["balanced", "high_junk", "vegetarian", "non_veg", "high_protein"],
            )),
        }
    }
}

impl fmt::Display for DietType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allergen {
    Peanut,
    TreeNut,
    Dairy,
    Gluten,
    Egg,
    Soy,
    Fish,
    Shellfish,
    /// Reported but unspecified; excludes nothing.
    Other,
}

impl Allergen {
    /// Parse a list of reported allergies, dropping "none" answers and duplicates.
    pub fn parse_list(values: &[String]) -> Result<Vec<Allergen>> {
        let mut out = Vec::new();
        for v in values {
            if matches!(normalize_key(v).as_str(), "" | "none" | "no") {
                continue;
            }
            let a: Allergen = v.parse()?;
            if !out.contains(&a) {
                out.push(a);
            }
        }
        Ok(out)
    }
}

impl FromStr for Allergen {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "peanut" | "peanuts" => Ok(Self::Peanut),
            "tree_nut" | "tree_nuts" | "nuts" => Ok(Self::TreeNut),
            "dairy" | "milk" | "lactose" => Ok(Self::Dairy),
            "gluten" | "wheat" => Ok(Self::Gluten),
            "egg" | "eggs" => Ok(Self::Egg),
            "soy" | "soya" => Ok(Self::Soy),
            "fish" => Ok(Self::Fish),
            "shellfish" => Ok(Self::Shellfish),
            "other" => Ok(Self::Other),
            _ => Err(invalid(
                "allergen",
                s,
                &[
                    "peanut",
                    "tree_nut",
                    "dairy",
                    "gluten",
                    "egg",
                    "soy",
                    "fish",
                    "shellfish",
                    "other",
                ],
            )),
        }
    }
}

impl fmt::Display for Allergen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Peanut => "peanut",
            Self::TreeNut => "tree_nut",
            Self::Dairy => "dairy",
            Self::Gluten => "gluten",
            Self::Egg => "egg",
            Self::Soy => "soy",
            Self::Fish => "fish",
            Self::Shellfish => "shellfish",
            Self::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    Bodyweight,
    Bands,
    Dumbbells,
    FullGym,
}

impl FromStr for Equipment {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "none" | "bodyweight" | "no_equipment" => Ok(Self::Bodyweight),
            "bands" | "resistance_bands" => Ok(Self::Bands),
            "dumbbells" | "dumbbell" => Ok(Self::Dumbbells),
            "full_gym" | "gym" => Ok(Self::FullGym),
            _ => Err(invalid(
                "equipment access",
                s,
                &["none", "bands", "dumbbells", "full_gym"],
            )),
        }
    }
}

impl fmt::Display for Equipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bodyweight => "bodyweight",
            Self::Bands => "bands",
            Self::Dumbbells => "dumbbells",
            Self::FullGym => "full_gym",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutTime {
    Morning,
    Lunch,
    Evening,
}

impl WorkoutTime {
    /// Start of the preferred training band.
    #[must_use]
    pub fn start(self) -> NaiveTime {
        let hour = match self {
            Self::Morning => 7,
            Self::Lunch => 12,
            Self::Evening => 18,
        };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
    }
}

impl FromStr for WorkoutTime {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "morning" => Ok(Self::Morning),
            "lunch" | "midday" | "afternoon" => Ok(Self::Lunch),
            "evening" | "night" => Ok(Self::Evening),
            _ => Err(invalid(
                "preferred workout time",
                s,
                &["morning", "lunch", "evening"],
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepsHabit {
    #[serde(rename = "<3k")]
    Under3k,
    #[serde(rename = "3-6k")]
    From3kTo6k,
    #[serde(rename = "6-10k")]
    From6kTo10k,
    #[serde(rename = "10k+")]
    Over10k,
}

impl FromStr for StepsHabit {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "<3k" | "under_3k" => Ok(Self::Under3k),
            "3_6k" => Ok(Self::From3kTo6k),
            "6_10k" => Ok(Self::From6kTo10k),
            "10k+" | "over_10k" => Ok(Self::Over10k),
            _ => Err(invalid("steps per day", s, &["<3k", "3-6k", "6-10k", "10k+"])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepHabit {
    #[serde(rename = "<5h")]
    Under5h,
    #[serde(rename = "5-7h")]
    From5To7h,
    #[serde(rename = "7-9h")]
    From7To9h,
    #[serde(rename = "9+")]
    Over9h,
}

impl FromStr for SleepHabit {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "<5h" | "under_5h" => Ok(Self::Under5h),
            "5_7h" => Ok(Self::From5To7h),
            "7_9h" => Ok(Self::From7To9h),
            "9+" | "9h+" | "over_9h" => Ok(Self::Over9h),
            _ => Err(invalid("sleep hours", s, &["<5h", "5-7h", "7-9h", "9+"])),
        }
    }
}

// --- Plan enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
}

impl MealSlot {
    /// Slots in the order they occur during the day.
    pub const ALL: [MealSlot; 4] = [Self::Breakfast, Self::Lunch, Self::Snack, Self::Dinner];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Snack => "snack",
            Self::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutKind {
    Home,
    Gym,
    Recovery,
}

impl WorkoutKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Gym => "Gym",
            Self::Recovery => "Recovery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Meal,
    Workout,
    Water,
    Sleep,
}

impl TaskKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meal => "meal",
            Self::Workout => "workout",
            Self::Water => "water",
            Self::Sleep => "sleep",
        }
    }
}

impl FromStr for TaskKind {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "meal" => Ok(Self::Meal),
            "workout" => Ok(Self::Workout),
            "water" => Ok(Self::Water),
            "sleep" => Ok(Self::Sleep),
            _ => Err(invalid("task kind", s, &["meal", "workout", "water", "sleep"])),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Onboarding ---

fn default_steps() -> String {
    "3-6k".to_string()
}

fn default_sleep() -> String {
    "7-9h".to_string()
}

fn default_diet() -> String {
    "balanced".to_string()
}

fn default_equipment() -> String {
    "none".to_string()
}

fn default_workout_time() -> String {
    "evening".to_string()
}

fn default_wake_time() -> String {
    "06:30".to_string()
}

fn default_bed_time() -> String {
    "22:30".to_string()
}

/// Questionnaire answers exactly as submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingAnswers {
    #[serde(default)]
    pub full_name: String,
    pub age_group: String,
    pub gender: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: String,
    #[serde(default = "default_steps")]
    pub steps_per_day: String,
    #[serde(default)]
    pub exercise_frequency: Option<String>,
    #[serde(default = "default_sleep")]
    pub sleep_hours: String,
    #[serde(default)]
    pub water_intake: Option<String>,
    #[serde(default = "default_diet")]
    pub diet_type: String,
    #[serde(default)]
    pub fruits_vegetables: Option<String>,
    #[serde(default)]
    pub smoking_alcohol: Option<String>,
    #[serde(default)]
    pub stress_level: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub cuisine_preference: Option<String>,
    pub primary_goal: String,
    #[serde(default = "default_equipment")]
    pub equipment_access: String,
    #[serde(default = "default_workout_time")]
    pub preferred_workout_time: String,
    #[serde(default = "default_wake_time")]
    pub wake_time: String,
    #[serde(default = "default_bed_time")]
    pub bed_time: String,
    #[serde(default)]
    pub training_days: Vec<String>,
}

/// Inputs to the metrics calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileInput {
    pub age_group: AgeGroup,
    pub sex: Sex,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
}

/// Answers the target planner reads besides the metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lifestyle {
    pub goal: PrimaryGoal,
    pub diet: DietType,
    pub steps_habit: StepsHabit,
    pub sleep_habit: SleepHabit,
}

/// Answers the plan generator reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanPreferences {
    pub goal: PrimaryGoal,
    pub diet: DietType,
    pub allergies: Vec<Allergen>,
    pub equipment: Equipment,
    pub workout_time: WorkoutTime,
    #[serde(with = "hhmm")]
    pub wake_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub bed_time: NaiveTime,
    /// Empty means every day is a training day.
    #[serde(default)]
    pub training_days: Vec<Weekday>,
}

impl PlanPreferences {
    #[must_use]
    pub fn is_training_day(&self, weekday: Weekday) -> bool {
        self.training_days.is_empty() || self.training_days.contains(&weekday)
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedAnswers {
    pub full_name: String,
    pub input: ProfileInput,
    pub lifestyle: Lifestyle,
    pub preferences: PlanPreferences,
}

impl OnboardingAnswers {
    pub fn validate(&self) -> Result<ValidatedAnswers> {
        let goal: PrimaryGoal = self.primary_goal.parse()?;
        let diet: DietType = self.diet_type.parse()?;

        let mut training_days = Vec::new();
        for d in &self.training_days {
            let day: Weekday = d
                .trim()
                .parse()
                .map_err(|_| PlanError::Validation(format!("Invalid training day '{d}'")))?;
            if !training_days.contains(&day) {
                training_days.push(day);
            }
        }
        training_days.sort_by_key(Weekday::num_days_from_monday);

        let wake_time = parse_time(&self.wake_time)?;
        let bed_time = parse_time(&self.bed_time)?;
        if wake_time == bed_time {
            return Err(PlanError::Validation(
                "Bed time and wake time must differ".into(),
            ));
        }

        Ok(ValidatedAnswers {
            full_name: self.full_name.trim().to_string(),
            input: ProfileInput {
                age_group: self.age_group.parse()?,
                sex: self.gender.parse()?,
                height_cm: self.height_cm,
                weight_kg: self.weight_kg,
                activity_level: self.activity_level.parse()?,
            },
            lifestyle: Lifestyle {
                goal,
                diet,
                steps_habit: self.steps_per_day.parse()?,
                sleep_habit: self.sleep_hours.parse()?,
            },
            preferences: PlanPreferences {
                goal,
                diet,
                allergies: Allergen::parse_list(&self.allergies)?,
                equipment: self.equipment_access.parse()?,
                workout_time: self.preferred_workout_time.parse()?,
                wake_time,
                bed_time,
                training_days,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub completed: bool,
    pub has_profile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

// --- Derived profile ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub bmi: f64,
    pub bmr: f64,
    pub activity_level: ActivityLevel,
    pub tdee: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MacroSplit {
    pub protein_pct: i64,
    pub carbs_pct: i64,
    pub fat_pct: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MacroTargets {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Targets {
    pub calories: f64,
    pub split: MacroSplit,
    pub macros: MacroTargets,
    pub water_ml: u32,
    pub sleep_hours: f64,
    pub steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub created_at: String,
}

/// A user together with their freshly issued bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub full_name: String,
    pub input: ProfileInput,
    pub lifestyle: Lifestyle,
    pub preferences: PlanPreferences,
    pub metrics: Metrics,
    pub targets: Targets,
    pub created_at: String,
    pub updated_at: String,
}

// --- Daily plan ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meal {
    pub slot: MealSlot,
    pub template_id: String,
    pub name: String,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutSection {
    pub name: String,
    pub exercises: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub template_id: String,
    pub name: String,
    pub kind: WorkoutKind,
    #[serde(with = "hhmm")]
    pub scheduled_at: NaiveTime,
    pub duration_minutes: u32,
    pub calories_burned: u32,
    pub sections: Vec<WorkoutSection>,
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SleepWindow {
    #[serde(with = "hhmm")]
    pub bed_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub wake_time: NaiveTime,
    pub hours: f64,
}

impl SleepWindow {
    /// Build a window from bed and wake times, wrapping past midnight.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(bed_time: NaiveTime, wake_time: NaiveTime) -> Self {
        let mut minutes = (wake_time - bed_time).num_minutes();
        if minutes <= 0 {
            minutes += 24 * 60;
        }
        Self {
            bed_time,
            wake_time,
            hours: minutes as f64 / 60.0,
        }
    }
}

/// The generated plan for one user and date. Carries no ids or timestamps, so
/// identical inputs always produce identical plans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub meals: Vec<Meal>,
    pub workout: Workout,
    pub water_goal_ml: u32,
    pub sleep: SleepWindow,
    pub step_target: u32,
    pub calories_target: f64,
    pub macros: MacroTargets,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    #[serde(flatten)]
    pub plan: DailyPlan,
}

// --- Tasks ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewTask {
    /// Stable per plan: the same plan always yields the same keys.
    pub key: String,
    pub kind: TaskKind,
    pub title: String,
    #[serde(with = "hhmm")]
    pub due_at: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub uuid: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub key: String,
    pub kind: TaskKind,
    pub title: String,
    #[serde(with = "hhmm")]
    pub due_at: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub created_at: String,
}

// --- Progress ---

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewProgressLog {
    pub date: Option<NaiveDate>,
    pub weight_kg: Option<f64>,
    pub steps: Option<u32>,
    pub water_ml: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLog {
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub steps: Option<u32>,
    pub water_ml: Option<u32>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    MealCompleted,
    WorkoutCompleted { minutes: u32 },
    WaterGoalCompleted,
    SleepCompleted,
    WeightLogged { kg: f64 },
    StepsLogged { steps: u32 },
    WaterLogged { ml: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl CompletionEvent {
    #[must_use]
    pub fn new(date: NaiveDate, kind: EventKind) -> Self {
        Self { date, kind }
    }
}

/// Per-day aggregate with streak counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressRecord {
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub steps: Option<u32>,
    pub water_ml: Option<u32>,
    pub workout_minutes: u32,
    pub meals_completed: u32,
    pub workout_completed: bool,
    pub water_goal_completed: bool,
    pub sleep_completed: bool,
    pub qualifies: bool,
    pub fitness_score: u32,
    pub streak_current: u32,
    pub streak_max: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyTotals {
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_start: NaiveDate,
    pub workouts: u32,
    pub workout_minutes: u32,
    pub meals_completed: u32,
    pub avg_daily_water_ml: f64,
    pub total_steps: u64,
    pub latest_weight_kg: Option<f64>,
    pub qualifying_days: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct PeriodTotals {
    pub workouts: u32,
    pub workout_minutes: u32,
    pub meals_completed: u32,
    pub avg_daily_water_ml: f64,
    pub total_steps: u64,
    pub latest_weight_kg: Option<f64>,
    pub qualifying_days: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<ProgressRecord>,
    pub weeks: Vec<WeeklyTotals>,
    pub totals: PeriodTotals,
    pub streak_current: u32,
    pub streak_max: u32,
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(PlanError::Validation(format!(
                "Date range end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending on `end`, inclusive.
    pub fn ending_on(end: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(PlanError::validation("Number of days must be at least 1"));
        }
        let start = end - chrono::Duration::days(i64::from(days) - 1);
        Self::new(start, end)
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}
