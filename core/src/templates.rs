use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::models::{
    Allergen, DietType, Equipment, MealSlot, PrimaryGoal, WorkoutKind, WorkoutSection,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealTemplate {
    pub id: String,
    pub slot: MealSlot,
    pub name: String,
    /// Nutrition for one reference serving. Plans scale this to the slot's
    /// calorie share, so only the ratios matter.
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    /// Diets this template suits. Empty means any diet.
    #[serde(default)]
    pub diets: Vec<DietType>,
    #[serde(default)]
    pub allergens: Vec<Allergen>,
    /// Unrestricted fallback for the slot.
    #[serde(default)]
    pub default: bool,
}

impl MealTemplate {
    #[must_use]
    pub fn suits_diet(&self, diet: DietType) -> bool {
        self.diets.is_empty() || self.diets.contains(&diet)
    }

    #[must_use]
    pub fn is_safe_for(&self, allergies: &[Allergen]) -> bool {
        !self.allergens.iter().any(|a| allergies.contains(a))
    }

    #[must_use]
    pub fn admits(&self, slot: MealSlot, diet: DietType, allergies: &[Allergen]) -> bool {
        self.slot == slot && self.suits_diet(diet) && self.is_safe_for(allergies)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub kind: WorkoutKind,
    /// Equipment this template can be done with. Empty means any.
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    /// Goals this template targets. Empty means generic.
    #[serde(default)]
    pub goals: Vec<PrimaryGoal>,
    pub duration_minutes: u32,
    pub calories_burned: u32,
    pub sections: Vec<WorkoutSection>,
    #[serde(default)]
    pub default: bool,
}

impl WorkoutTemplate {
    #[must_use]
    pub fn usable_with(&self, equipment: Equipment) -> bool {
        self.equipment.is_empty() || self.equipment.contains(&equipment)
    }

    #[must_use]
    pub fn targets(&self, goal: PrimaryGoal) -> bool {
        self.goals.contains(&goal)
    }

    #[must_use]
    pub fn matches(&self, equipment: Equipment, goal: PrimaryGoal) -> bool {
        self.kind != WorkoutKind::Recovery
            && self.usable_with(equipment)
            && (self.goals.is_empty() || self.targets(goal))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateLibrary {
    pub meals: Vec<MealTemplate>,
    pub workouts: Vec<WorkoutTemplate>,
}

impl TemplateLibrary {
    pub fn from_json(json: &str) -> Result<Self> {
        let lib: TemplateLibrary = serde_json::from_str(json)?;
        lib.validate()?;
        Ok(lib)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for m in &self.meals {
            if !ids.insert(m.id.as_str()) {
                return Err(PlanError::Validation(format!(
                    "Duplicate meal template id '{}'",
                    m.id
                )));
            }
            if !m.calories.is_finite() || m.calories <= 0.0 {
                return Err(PlanError::Validation(format!(
                    "Meal template '{}' must have positive calories",
                    m.id
                )));
            }
            if [m.protein_g, m.carbs_g, m.fat_g]
                .iter()
                .any(|g| !g.is_finite() || *g < 0.0)
            {
                return Err(PlanError::Validation(format!(
                    "Meal template '{}' has negative macros",
                    m.id
                )));
            }
            if m.default && (!m.diets.is_empty() || !m.allergens.is_empty()) {
                return Err(PlanError::Validation(format!(
                    "Default meal template '{}' must be unrestricted",
                    m.id
                )));
            }
        }
        for slot in MealSlot::ALL {
            if self.default_meal(slot).is_none() {
                return Err(PlanError::Validation(format!(
                    "No default meal template for {slot}"
                )));
            }
        }

        let mut ids = HashSet::new();
        for w in &self.workouts {
            if !ids.insert(w.id.as_str()) {
                return Err(PlanError::Validation(format!(
                    "Duplicate workout template id '{}'",
                    w.id
                )));
            }
            if w.duration_minutes == 0 {
                return Err(PlanError::Validation(format!(
                    "Workout template '{}' must have a positive duration",
                    w.id
                )));
            }
        }
        if self.default_workout().is_none() {
            return Err(PlanError::validation(
                "No default workout template that needs no equipment",
            ));
        }
        Ok(())
    }

    /// Non-default templates admitting the slot, diet and allergies, sorted by id.
    #[must_use]
    pub fn meal_candidates(
        &self,
        slot: MealSlot,
        diet: DietType,
        allergies: &[Allergen],
    ) -> Vec<&MealTemplate> {
        let mut out: Vec<&MealTemplate> = self
            .meals
            .iter()
            .filter(|m| !m.default && m.admits(slot, diet, allergies))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    #[must_use]
    pub fn default_meal(&self, slot: MealSlot) -> Option<&MealTemplate> {
        self.meals
            .iter()
            .filter(|m| m.default && m.slot == slot)
            .min_by(|a, b| a.id.cmp(&b.id))
    }

    /// Matching non-default workouts, sorted by id. Goal-specific templates win
    /// over generic ones when both exist.
    #[must_use]
    pub fn workout_candidates(&self, equipment: Equipment, goal: PrimaryGoal) -> Vec<&WorkoutTemplate> {
        let mut matching: Vec<&WorkoutTemplate> = self
            .workouts
            .iter()
            .filter(|w| !w.default && w.matches(equipment, goal))
            .collect();
        if matching.iter().any(|w| w.targets(goal)) {
            matching.retain(|w| w.targets(goal));
        }
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching
    }

    #[must_use]
    pub fn default_workout(&self) -> Option<&WorkoutTemplate> {
        self.workouts
            .iter()
            .filter(|w| w.default && w.equipment.is_empty() && w.kind != WorkoutKind::Recovery)
            .min_by(|a, b| a.id.cmp(&b.id))
    }

    #[must_use]
    pub fn recovery_workout(&self) -> Option<&WorkoutTemplate> {
        self.workouts
            .iter()
            .filter(|w| w.kind == WorkoutKind::Recovery && w.usable_with(Equipment::Bodyweight))
            .min_by(|a, b| a.id.cmp(&b.id))
    }

    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn builtin() -> Self {
        use Allergen::{Dairy, Egg, Fish, Gluten, Peanut, Soy, TreeNut};
        use DietType::{Balanced, HighJunk, HighProtein, NonVeg, Vegetarian};
        use MealSlot::{Breakfast, Dinner, Lunch, Snack};

        let veg = [Vegetarian, Balanced, HighJunk, HighProtein];
        let non_veg = [NonVeg, Balanced, HighJunk, HighProtein];

        let meal = |id: &str,
                    slot: MealSlot,
                    name: &str,
                    macros: [f64; 4],
                    diets: &[DietType],
                    allergens: &[Allergen]| MealTemplate {
            id: id.to_string(),
            slot,
            name: name.to_string(),
            calories: macros[0],
            protein_g: macros[1],
            carbs_g: macros[2],
            fat_g: macros[3],
            diets: diets.to_vec(),
            allergens: allergens.to_vec(),
            default: false,
        };
        let fallback = |id: &str, slot: MealSlot, name: &str, macros: [f64; 4]| MealTemplate {
            default: true,
            ..meal(id, slot, name, macros, &[], &[])
        };

        let meals = vec![
            meal("breakfast-oats-fruit", Breakfast, "Oats with fruits", [350.0, 12.0, 60.0, 7.0], &veg, &[Dairy, Gluten]),
            meal("breakfast-poha", Breakfast, "Poha with vegetables", [300.0, 6.0, 55.0, 7.0], &veg, &[]),
            meal("breakfast-upma", Breakfast, "Upma with nuts", [320.0, 8.0, 48.0, 11.0], &veg, &[Gluten, TreeNut]),
            meal("breakfast-smoothie-bowl", Breakfast, "Smoothie bowl", [330.0, 10.0, 55.0, 8.0], &veg, &[Dairy]),
            meal("breakfast-omelette-toast", Breakfast, "Egg omelette with toast", [380.0, 22.0, 30.0, 18.0], &non_veg, &[Egg, Gluten]),
            meal("breakfast-scrambled-eggs", Breakfast, "Scrambled eggs", [300.0, 20.0, 4.0, 22.0], &non_veg, &[Egg, Dairy]),
            meal("breakfast-egg-sandwich", Breakfast, "Egg sandwich", [400.0, 20.0, 40.0, 16.0], &non_veg, &[Egg, Gluten]),
            meal("breakfast-protein-smoothie", Breakfast, "Protein smoothie", [320.0, 30.0, 35.0, 6.0], &non_veg, &[Dairy]),
            fallback("breakfast-fruit-bowl", Breakfast, "Fresh fruit bowl with seeds", [300.0, 6.0, 60.0, 5.0]),
            meal("lunch-dal-chawal", Lunch, "Dal-Chawal with vegetables", [520.0, 20.0, 85.0, 10.0], &veg, &[]),
            meal("lunch-quinoa-salad", Lunch, "Quinoa salad", [450.0, 15.0, 60.0, 16.0], &veg, &[]),
            meal("lunch-veg-curry-roti", Lunch, "Vegetable curry with roti", [500.0, 14.0, 70.0, 18.0], &veg, &[Gluten]),
            meal("lunch-paneer-bhurji", Lunch, "Paneer bhurji", [480.0, 26.0, 20.0, 32.0], &veg, &[Dairy]),
            meal("lunch-chicken-rice", Lunch, "Grilled chicken with rice", [550.0, 42.0, 60.0, 12.0], &non_veg, &[]),
            meal("lunch-fish-curry-roti", Lunch, "Fish curry with roti", [520.0, 35.0, 50.0, 18.0], &non_veg, &[Fish, Gluten]),
            meal("lunch-chicken-salad", Lunch, "Chicken salad", [420.0, 38.0, 15.0, 22.0], &non_veg, &[]),
            meal("lunch-egg-curry", Lunch, "Egg curry", [450.0, 22.0, 30.0, 26.0], &non_veg, &[Egg]),
            fallback("lunch-rice-veg-bowl", Lunch, "Rice and vegetable bowl", [480.0, 12.0, 90.0, 8.0]),
            meal("snack-mixed-nuts", Snack, "Mixed nuts", [200.0, 6.0, 8.0, 17.0], &veg, &[TreeNut, Peanut]),
            meal("snack-fruit-salad", Snack, "Fruit salad", [150.0, 2.0, 36.0, 1.0], &veg, &[]),
            meal("snack-yogurt-berries", Snack, "Yogurt with berries", [180.0, 10.0, 24.0, 5.0], &veg, &[Dairy]),
            meal("snack-sprouts-chaat", Snack, "Sprouts chaat", [170.0, 11.0, 28.0, 2.0], &veg, &[]),
            meal("snack-boiled-eggs", Snack, "Boiled eggs", [155.0, 13.0, 1.0, 11.0], &non_veg, &[Egg]),
            meal("snack-chicken-strips", Snack, "Chicken strips", [220.0, 26.0, 8.0, 9.0], &non_veg, &[Gluten]),
            meal("snack-protein-bar", Snack, "Protein bar", [210.0, 20.0, 22.0, 7.0], &non_veg, &[Peanut, Soy, Dairy]),
            meal("snack-greek-yogurt", Snack, "Greek yogurt", [150.0, 15.0, 9.0, 6.0], &non_veg, &[Dairy]),
            fallback("snack-fresh-fruit", Snack, "Fresh fruit", [120.0, 1.0, 30.0, 0.5]),
            meal("dinner-light-dal-roti", Dinner, "Light dal with roti", [420.0, 18.0, 65.0, 9.0], &veg, &[Gluten]),
            meal("dinner-vegetable-soup", Dinner, "Vegetable soup", [250.0, 8.0, 38.0, 7.0], &veg, &[]),
            meal("dinner-paneer-salad", Dinner, "Grilled paneer salad", [400.0, 24.0, 14.0, 28.0], &veg, &[Dairy]),
            meal("dinner-curd-rice", Dinner, "Curd rice", [380.0, 12.0, 60.0, 9.0], &veg, &[Dairy]),
            meal("dinner-grilled-fish", Dinner, "Grilled fish with vegetables", [400.0, 38.0, 15.0, 20.0], &non_veg, &[Fish]),
            meal("dinner-chicken-soup", Dinner, "Chicken soup", [300.0, 28.0, 18.0, 12.0], &non_veg, &[]),
            meal("dinner-lean-meat-salad", Dinner, "Lean meat with salad", [420.0, 40.0, 12.0, 22.0], &non_veg, &[]),
            meal("dinner-egg-bhurji", Dinner, "Egg bhurji", [350.0, 20.0, 8.0, 26.0], &non_veg, &[Egg]),
            fallback("dinner-steamed-veg-rice", Dinner, "Steamed vegetables with rice", [420.0, 10.0, 80.0, 7.0]),
        ];

        let timed = |name: &str, exercises: &[&str], minutes: u32| WorkoutSection {
            name: name.to_string(),
            exercises: exercises.iter().map(ToString::to_string).collect(),
            sets: None,
            reps: None,
            duration_minutes: Some(minutes),
        };
        let sets = |name: &str, exercises: &[&str], sets: u32, reps: &str| WorkoutSection {
            name: name.to_string(),
            exercises: exercises.iter().map(ToString::to_string).collect(),
            sets: Some(sets),
            reps: Some(reps.to_string()),
            duration_minutes: None,
        };

        let workouts = vec![
            WorkoutTemplate {
                id: "home-bodyweight".into(),
                name: "Bodyweight circuit".into(),
                kind: WorkoutKind::Home,
                equipment: vec![Equipment::Bodyweight],
                goals: vec![],
                duration_minutes: 30,
                calories_burned: 150,
                sections: vec![
                    timed("Warmup", &["Jumping jacks", "Arm circles"], 5),
                    sets("Bodyweight", &["Push-ups", "Squats", "Planks"], 3, "12-15"),
                    timed("Cardio", &["High knees", "Burpees"], 10),
                ],
                default: false,
            },
            WorkoutTemplate {
                id: "home-resistance".into(),
                name: "Resistance training".into(),
                kind: WorkoutKind::Home,
                equipment: vec![Equipment::Bands, Equipment::Dumbbells],
                goals: vec![],
                duration_minutes: 35,
                calories_burned: 175,
                sections: vec![
                    timed("Warmup", &["Dynamic stretching"], 5),
                    sets("Resistance", &["Band pulls", "Dumbbell rows"], 3, "10-12"),
                    timed("Cardio", &["Jump rope", "Mountain climbers"], 10),
                ],
                default: false,
            },
            WorkoutTemplate {
                id: "gym-hypertrophy".into(),
                name: "Hypertrophy session".into(),
                kind: WorkoutKind::Gym,
                equipment: vec![Equipment::FullGym],
                goals: vec![PrimaryGoal::GainMuscle],
                duration_minutes: 45,
                calories_burned: 225,
                sections: vec![
                    timed("Warmup", &["Treadmill walk"], 5),
                    sets("Compound", &["Bench press", "Squats", "Deadlifts"], 4, "6-8"),
                    sets("Accessories", &["Bicep curls", "Tricep extensions"], 3, "10-12"),
                ],
                default: false,
            },
            WorkoutTemplate {
                id: "gym-cardio-strength".into(),
                name: "Cardio and strength".into(),
                kind: WorkoutKind::Gym,
                equipment: vec![Equipment::FullGym],
                goals: vec![],
                duration_minutes: 45,
                calories_burned: 225,
                sections: vec![
                    timed("Warmup", &["Treadmill"], 5),
                    timed("Cardio", &["Running", "Cycling"], 20),
                    sets("Strength", &["Light weights"], 3, "12-15"),
                ],
                default: false,
            },
            WorkoutTemplate {
                id: "walk-mobility".into(),
                name: "Brisk walk and mobility".into(),
                kind: WorkoutKind::Home,
                equipment: vec![],
                goals: vec![],
                duration_minutes: 30,
                calories_burned: 150,
                sections: vec![
                    timed("Walk", &["Brisk walk"], 20),
                    timed("Mobility", &["Hip openers", "Cat-cow", "Hamstring stretch"], 10),
                ],
                default: true,
            },
            WorkoutTemplate {
                id: "recovery-stretch".into(),
                name: "Active recovery".into(),
                kind: WorkoutKind::Recovery,
                equipment: vec![],
                goals: vec![],
                duration_minutes: 20,
                calories_burned: 60,
                sections: vec![
                    timed("Easy walk", &["Easy walk"], 10),
                    timed("Stretching", &["Full-body stretch", "Deep breathing"], 10),
                ],
                default: false,
            },
        ];

        Self { meals, workouts }
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let lib = TemplateLibrary::builtin();
        lib.validate().unwrap();
        assert!(lib.recovery_workout().is_some());
    }

    #[test]
    fn test_meal_candidates_follow_diet() {
        let lib = TemplateLibrary::builtin();
        let veg = lib.meal_candidates(MealSlot::Lunch, DietType::Vegetarian, &[]);
        assert_eq!(veg.len(), 4);
        assert!(veg.iter().all(|m| m.suits_diet(DietType::Vegetarian)));
        assert!(veg.iter().all(|m| !m.name.contains("chicken") && !m.name.contains("Chicken")));

        let both = lib.meal_candidates(MealSlot::Lunch, DietType::Balanced, &[]);
        assert_eq!(both.len(), 8);
        let ids: Vec<&str> = both.iter().map(|m| m.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_meal_candidates_exclude_allergens() {
        let lib = TemplateLibrary::builtin();
        let safe = lib.meal_candidates(MealSlot::Snack, DietType::Vegetarian, &[Allergen::Dairy]);
        assert!(safe.iter().all(|m| !m.allergens.contains(&Allergen::Dairy)));
        assert!(!safe.iter().any(|m| m.id == "snack-yogurt-berries"));
        assert!(safe.iter().all(|m| !m.default));
    }

    #[test]
    fn test_workout_candidates_prefer_goal_specific() {
        let lib = TemplateLibrary::builtin();
        let gain = lib.workout_candidates(Equipment::FullGym, PrimaryGoal::GainMuscle);
        assert_eq!(gain.len(), 1);
        assert_eq!(gain[0].id, "gym-hypertrophy");

        let other = lib.workout_candidates(Equipment::FullGym, PrimaryGoal::LoseWeight);
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].id, "gym-cardio-strength");

        let bands = lib.workout_candidates(Equipment::Bands, PrimaryGoal::Maintain);
        assert_eq!(bands[0].id, "home-resistance");
    }

    #[test]
    fn test_from_json_rejects_missing_defaults() {
        let mut lib = TemplateLibrary::builtin();
        lib.meals.retain(|m| !(m.default && m.slot == MealSlot::Dinner));
        let json = serde_json::to_string(&lib).unwrap();
        let err = TemplateLibrary::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("dinner"), "{err}");
    }

    #[test]
    fn test_from_json_rejects_duplicate_ids() {
        let mut lib = TemplateLibrary::builtin();
        let dup = lib.meals[0].clone();
        lib.meals.push(dup);
        let json = serde_json::to_string(&lib).unwrap();
        assert!(matches!(
            TemplateLibrary::from_json(&json),
            Err(PlanError::Validation(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        std::fs::write(&path, serde_json::to_string(&TemplateLibrary::builtin()).unwrap())
            .unwrap();
        let lib = TemplateLibrary::load(&path).unwrap();
        assert_eq!(lib, TemplateLibrary::builtin());

        assert!(matches!(
            TemplateLibrary::load(&dir.path().join("missing.json")),
            Err(PlanError::Io(_))
        ));
    }
}
