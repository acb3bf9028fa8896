use std::fmt::Write as _;
use std::path::Path;

use chrono::{Local, NaiveDate};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{PlanError, Result};
use crate::metrics::compute_metrics;
use crate::models::{
    DailyPlan, DateRange, NewProgressLog, NewUser, OnboardingAnswers, OnboardingStatus, PlanRecord, Profile,
    ProgressLog, ProgressSummary, Task, User,
};
use crate::plan::generate_plan;
use crate::progress::{MAX_RANGE_DAYS, StreakPolicy, aggregate_progress_since};
use crate::targets::compute_targets;
use crate::tasks::materialize_tasks;
use crate::templates::TemplateLibrary;

/// Upper bound on a progress window request.
pub const MAX_SUMMARY_DAYS: u32 = 366;

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

/// Fresh 256-bit bearer token, hex encoded.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    to_hex(&bytes)
}

/// Tokens are stored only as their SHA-256 digest.
#[must_use]
pub fn hash_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

pub struct FitService {
    db: Database,
    templates: TemplateLibrary,
}

impl FitService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self {
            db,
            templates: TemplateLibrary::builtin(),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            templates: TemplateLibrary::builtin(),
        })
    }

    #[must_use]
    pub fn with_templates(mut self, templates: TemplateLibrary) -> Self {
        self.templates = templates;
        self
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    // --- Identity ---

    pub fn create_user(&self, display_name: &str) -> Result<NewUser> {
        let display_name = display_name.trim();
        if display_name.chars().count() > 100 {
            return Err(PlanError::validation(
                "Display name must be at most 100 characters",
            ));
        }
        let token = generate_token();
        let user = self.db.insert_user(display_name, &hash_token(&token))?;
        info!(user_id = %user.id, "created user");
        Ok(NewUser { user, token })
    }

    pub fn authenticate(&self, token: &str) -> Result<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.db.find_user_by_token_hash(&hash_token(token))
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.db.get_user(user_id)
    }

    /// Issue a new token for the user. The previous token stops working.
    pub fn rotate_token(&self, user_id: &str) -> Result<NewUser> {
        let token = generate_token();
        if !self.db.set_token_hash(user_id, &hash_token(&token))? {
            return Err(PlanError::NotFound(format!("user {user_id}")));
        }
        info!(%user_id, "rotated token");
        Ok(NewUser {
            user: self.db.get_user(user_id)?,
            token,
        })
    }

    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        if !self.db.delete_user(user_id)? {
            return Err(PlanError::NotFound(format!("user {user_id}")));
        }
        info!(%user_id, "deleted user and all owned records");
        Ok(())
    }

    // --- Onboarding ---

    /// Validate answers, recompute the profile wholesale, and regenerate plans
    /// from `today` onward. Plans for earlier dates are left untouched.
    pub fn submit_onboarding(
        &self,
        user_id: &str,
        answers: &OnboardingAnswers,
        today: NaiveDate,
    ) -> Result<Profile> {
        self.db.get_user(user_id)?;
        let validated = answers.validate()?;
        let metrics = compute_metrics(&validated.input)?;
        let targets = compute_targets(&metrics, &validated.lifestyle)?;

        let now = Local::now().to_rfc3339();
        let created_at = self
            .db
            .get_profile(user_id)?
            .map_or_else(|| now.clone(), |p| p.created_at);
        let full_name = if validated.full_name.is_empty() {
            self.db.get_user(user_id)?.display_name
        } else {
            validated.full_name
        };
        let profile = Profile {
            user_id: user_id.to_string(),
            full_name,
            input: validated.input,
            lifestyle: validated.lifestyle,
            preferences: validated.preferences,
            metrics,
            targets,
            created_at,
            updated_at: now,
        };

        let plan = generate_plan(&profile.targets, &profile.preferences, today, &self.templates)?;
        let removed = self.db.apply_onboarding(answers, &profile, today, &plan)?;
        info!(
            %user_id,
            bmi = profile.metrics.bmi,
            tdee = profile.metrics.tdee,
            calories = profile.targets.calories,
            removed_plans = removed,
            "onboarding submitted"
        );
        Ok(profile)
    }

    pub fn onboarding_status(&self, user_id: &str) -> Result<OnboardingStatus> {
        let session = self.db.latest_onboarding_session(user_id)?;
        let has_profile = self.db.get_profile(user_id)?.is_some();
        Ok(OnboardingStatus {
            completed: session.is_some() && has_profile,
            has_profile,
            completed_at: session.map(|(_, at)| at),
        })
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Profile> {
        self.db
            .get_profile(user_id)?
            .ok_or_else(|| PlanError::not_found("profile; complete onboarding first"))
    }

    // --- Plans & tasks ---

    /// The plan for `date`, generated and stored on first request.
    pub fn plan_for_date(&self, user_id: &str, date: NaiveDate) -> Result<PlanRecord> {
        if let Some(existing) = self.db.get_plan(user_id, date)? {
            return Ok(existing);
        }
        let profile = self.get_profile(user_id)?;
        let plan = generate_plan(&profile.targets, &profile.preferences, date, &self.templates)?;
        self.store_plan(user_id, &plan)
    }

    /// Insert a freshly generated plan. When another writer stored one for
    /// the same date first, that plan wins and is returned instead.
    fn store_plan(&self, user_id: &str, plan: &DailyPlan) -> Result<PlanRecord> {
        let date = plan.date;
        match self.db.insert_plan(user_id, plan) {
            Ok(record) => {
                info!(%user_id, %date, plan_id = %record.id, "generated daily plan");
                Ok(record)
            }
            Err(PlanError::Conflict(reason)) => {
                info!(%user_id, %date, %reason, "plan created concurrently, re-reading");
                self.db
                    .get_plan(user_id, date)?
                    .ok_or_else(|| PlanError::NotFound(format!("plan for {date}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Tasks for `date`, materialized from the plan on first request.
    pub fn tasks_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>> {
        let record = self.plan_for_date(user_id, date)?;
        let inserted = self
            .db
            .insert_tasks(user_id, date, &materialize_tasks(&record.plan))?;
        if inserted > 0 {
            debug!(%user_id, %date, inserted, "materialized tasks");
        }
        self.db.get_tasks_for_date(user_id, date)
    }

    pub fn set_task_completed(&self, user_id: &str, task_id: i64, completed: bool) -> Result<Task> {
        let now = Local::now().to_rfc3339();
        self.db.set_task_completed(user_id, task_id, completed, &now)
    }

    // --- Progress ---

    pub fn log_progress(
        &self,
        user_id: &str,
        log: &NewProgressLog,
        today: NaiveDate,
    ) -> Result<ProgressLog> {
        if log.weight_kg.is_none() && log.steps.is_none() && log.water_ml.is_none() {
            return Err(PlanError::validation(
                "Provide at least one of weight_kg, steps, water_ml",
            ));
        }
        if let Some(kg) = log.weight_kg {
            if !kg.is_finite() || kg <= 0.0 || kg > crate::metrics::MAX_WEIGHT_KG {
                return Err(PlanError::Validation(format!("Invalid weight {kg} kg")));
            }
        }
        let date = log.date.unwrap_or(today);
        if date > today {
            return Err(PlanError::Validation(format!(
                "Cannot log progress for future date {date}"
            )));
        }
        self.db
            .upsert_progress_log(user_id, date, log.weight_kg, log.steps, log.water_ml)
    }

    /// Summary of the `days` days ending `today`. Streaks are counted over the
    /// user's whole history, and today only breaks a streak once it is over.
    pub fn progress_summary(
        &self,
        user_id: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<ProgressSummary> {
        if days > MAX_SUMMARY_DAYS {
            return Err(PlanError::Validation(format!(
                "days must be at most {MAX_SUMMARY_DAYS}"
            )));
        }
        let window = DateRange::ending_on(today, days)?;
        let earliest = today - chrono::Duration::days(MAX_RANGE_DAYS - 1);
        let history_start = self
            .db
            .first_activity_date(user_id)?
            .map_or(window.start, |d| d.min(window.start))
            .max(earliest);
        let history = DateRange::new(history_start, today)?;
        let events = self.db.completion_events(user_id, history)?;
        let policy = StreakPolicy {
            pending_last_day: true,
            ..StreakPolicy::default()
        };
        aggregate_progress_since(&events, history_start, window, &policy)
    }
}
