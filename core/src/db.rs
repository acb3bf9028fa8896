use std::path::Path;

use chrono::{Local, NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, ffi, params};
use uuid::Uuid;

use crate::error::{PlanError, Result};
use crate::models::{
    CompletionEvent, DailyPlan, DateRange, EventKind, NewTask, OnboardingAnswers, PlanRecord,
    Profile, ProgressLog, Task, TaskKind, User,
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";

pub struct Database {
    conn: Connection,
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|e| conversion_error(idx, e))
}

fn time_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, TIME_FMT).map_err(|e| conversion_error(idx, e))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    token_hash TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS onboarding_sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    answers_json TEXT NOT NULL,
                    submitted_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    profile_json TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_plans (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    plan_json TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE(user_id, date)
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    task_key TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    title TEXT NOT NULL,
                    due_at TEXT NOT NULL,
                    duration_minutes INTEGER,
                    completed INTEGER NOT NULL DEFAULT 0,
                    completed_at TEXT,
                    created_at TEXT NOT NULL,
                    UNIQUE(user_id, date, task_key)
                );

                CREATE TABLE IF NOT EXISTS progress_logs (
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    weight_kg REAL,
                    steps INTEGER,
                    water_ml INTEGER,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, date)
                );

                CREATE INDEX IF NOT EXISTS idx_onboarding_user ON onboarding_sessions(user_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_user_date ON tasks(user_id, date);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Users ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            display_name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    pub fn insert_user(&self, display_name: &str, token_hash: &str) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO users (id, display_name, token_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, display_name, token_hash, now],
        )?;
        self.get_user(&id)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, display_name, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?
            .ok_or_else(|| PlanError::NotFound(format!("user {id}")))
    }

    pub fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, display_name, created_at FROM users WHERE token_hash = ?1",
                params![token_hash],
                Self::user_from_row,
            )
            .optional()?)
    }

    /// Replace a user's token hash. The previous token stops resolving.
    pub fn set_token_hash(&self, id: &str, token_hash: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE users SET token_hash = ?1 WHERE id = ?2",
            params![token_hash, id],
        )?;
        Ok(rows > 0)
    }

    /// Delete a user. Sessions, profile, plans, tasks and logs cascade.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Onboarding & profiles ---

    pub fn insert_onboarding_session(
        &self,
        user_id: &str,
        answers: &OnboardingAnswers,
    ) -> Result<String> {
        let now = Local::now().to_rfc3339();
        let json = serde_json::to_string(answers)?;
        self.conn.execute(
            "INSERT INTO onboarding_sessions (user_id, answers_json, submitted_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, json, now],
        )?;
        Ok(now)
    }

    /// Most recent submission and its timestamp.
    pub fn latest_onboarding_session(
        &self,
        user_id: &str,
    ) -> Result<Option<(OnboardingAnswers, String)>> {
        Ok(self
            .conn
            .query_row(
                "SELECT answers_json, submitted_at FROM onboarding_sessions
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
                params![user_id],
                |row| Ok((json_col(row, 0)?, row.get(1)?)),
            )
            .optional()?)
    }

    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        self.conn.execute(
            "INSERT INTO profiles (user_id, profile_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                profile_json = excluded.profile_json,
                updated_at = excluded.updated_at",
            params![
                profile.user_id,
                json,
                profile.created_at,
                profile.updated_at
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self
            .conn
            .query_row(
                "SELECT profile_json FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| json_col(row, 0),
            )
            .optional()?)
    }

    /// Record a submission, replace the profile, drop plans and open tasks
    /// dated `from` or later, and store the first regenerated plan. Either
    /// every write lands or none do. Returns the number of plans dropped.
    pub fn apply_onboarding(
        &self,
        answers: &OnboardingAnswers,
        profile: &Profile,
        from: NaiveDate,
        plan: &DailyPlan,
    ) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        self.insert_onboarding_session(&profile.user_id, answers)?;
        self.upsert_profile(profile)?;
        let dropped = self.delete_plans_from(&profile.user_id, from)?;
        self.insert_plan(&profile.user_id, plan)?;
        tx.commit()?;
        Ok(dropped)
    }

    // --- Plans ---

    fn plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<PlanRecord> {
        Ok(PlanRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plan: json_col(row, 2)?,
            created_at: row.get(3)?,
        })
    }

    /// Insert a plan and return it as stored. A second plan for the same
    /// user and date is a `PlanError::Conflict`.
    pub fn insert_plan(&self, user_id: &str, plan: &DailyPlan) -> Result<PlanRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        let json = serde_json::to_string(plan)?;
        let date_str = plan.date.format(DATE_FMT).to_string();
        self.conn
            .execute(
                "INSERT INTO daily_plans (id, user_id, date, plan_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, date_str, json, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PlanError::Conflict(format!("plan for {date_str} already exists"))
                } else {
                    e.into()
                }
            })?;
        self.get_plan(user_id, plan.date)?
            .ok_or_else(|| PlanError::NotFound(format!("plan for {date_str}")))
    }

    pub fn get_plan(&self, user_id: &str, date: NaiveDate) -> Result<Option<PlanRecord>> {
        let date_str = date.format(DATE_FMT).to_string();
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, plan_json, created_at FROM daily_plans
                 WHERE user_id = ?1 AND date = ?2",
                params![user_id, date_str],
                Self::plan_from_row,
            )
            .optional()?)
    }

    /// Drop plans dated on or after `from`, together with their open tasks.
    /// Completed tasks stay as history. Returns the number of plans removed.
    pub fn delete_plans_from(&self, user_id: &str, from: NaiveDate) -> Result<usize> {
        let from_str = from.format(DATE_FMT).to_string();
        self.conn.execute(
            "DELETE FROM tasks WHERE user_id = ?1 AND date >= ?2 AND completed = 0",
            params![user_id, from_str],
        )?;
        let rows = self.conn.execute(
            "DELETE FROM daily_plans WHERE user_id = ?1 AND date >= ?2",
            params![user_id, from_str],
        )?;
        Ok(rows)
    }

    // --- Tasks ---

    fn task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let kind: String = row.get(5)?;
        Ok(Task {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            date: date_col(row, 3)?,
            key: row.get(4)?,
            kind: kind.parse().map_err(|e| conversion_error(5, e))?,
            title: row.get(6)?,
            due_at: time_col(row, 7)?,
            duration_minutes: row.get(8)?,
            completed: row.get(9)?,
            completed_at: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    const TASK_COLUMNS: &'static str = "id, uuid, user_id, date, task_key, kind, title, due_at,
        duration_minutes, completed, completed_at, created_at";

    /// Insert tasks for a date, skipping keys that already exist. Returns how
    /// many were new.
    pub fn insert_tasks(&self, user_id: &str, date: NaiveDate, tasks: &[NewTask]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let now = Local::now().to_rfc3339();
        let date_str = date.format(DATE_FMT).to_string();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO tasks
                    (uuid, user_id, date, task_key, kind, title, due_at, duration_minutes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for task in tasks {
                inserted += stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    user_id,
                    date_str,
                    task.key,
                    task.kind.as_str(),
                    task.title,
                    task.due_at.format(TIME_FMT).to_string(),
                    task.duration_minutes,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn get_tasks_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>> {
        let date_str = date.format(DATE_FMT).to_string();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE user_id = ?1 AND date = ?2 ORDER BY due_at, id",
            Self::TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![user_id, date_str], Self::task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_task(&self, user_id: &str, id: i64) -> Result<Task> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM tasks WHERE user_id = ?1 AND id = ?2",
                    Self::TASK_COLUMNS
                ),
                params![user_id, id],
                Self::task_from_row,
            )
            .optional()?
            .ok_or_else(|| PlanError::NotFound(format!("task {id}")))
    }

    /// Toggle completion. `completed_at` is set to `now` when completing and
    /// cleared when reopening.
    pub fn set_task_completed(
        &self,
        user_id: &str,
        id: i64,
        completed: bool,
        now: &str,
    ) -> Result<Task> {
        let completed_at = completed.then_some(now);
        let rows = self.conn.execute(
            "UPDATE tasks SET completed = ?1, completed_at = ?2 WHERE user_id = ?3 AND id = ?4",
            params![completed, completed_at, user_id, id],
        )?;
        if rows == 0 {
            return Err(PlanError::NotFound(format!("task {id}")));
        }
        self.get_task(user_id, id)
    }

    // --- Progress ---

    fn progress_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<ProgressLog> {
        Ok(ProgressLog {
            date: date_col(row, 0)?,
            weight_kg: row.get(1)?,
            steps: row.get(2)?,
            water_ml: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    /// Merge a measurement into the day's log. Weight replaces the stored
    /// value, steps and water add to the day's running totals, and fields
    /// left `None` keep their previous value.
    pub fn upsert_progress_log(
        &self,
        user_id: &str,
        date: NaiveDate,
        weight_kg: Option<f64>,
        steps: Option<u32>,
        water_ml: Option<u32>,
    ) -> Result<ProgressLog> {
        let now = Local::now().to_rfc3339();
        let date_str = date.format(DATE_FMT).to_string();
        self.conn.execute(
            "INSERT INTO progress_logs (user_id, date, weight_kg, steps, water_ml, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, date) DO UPDATE SET
                weight_kg = COALESCE(excluded.weight_kg, progress_logs.weight_kg),
                steps = COALESCE(progress_logs.steps + excluded.steps,
                                 excluded.steps, progress_logs.steps),
                water_ml = COALESCE(progress_logs.water_ml + excluded.water_ml,
                                    excluded.water_ml, progress_logs.water_ml),
                updated_at = excluded.updated_at",
            params![user_id, date_str, weight_kg, steps, water_ml, now],
        )?;
        self.get_progress_log(user_id, date)?
            .ok_or_else(|| PlanError::NotFound(format!("progress log for {date_str}")))
    }

    pub fn get_progress_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<ProgressLog>> {
        let date_str = date.format(DATE_FMT).to_string();
        Ok(self
            .conn
            .query_row(
                "SELECT date, weight_kg, steps, water_ml, updated_at FROM progress_logs
                 WHERE user_id = ?1 AND date = ?2",
                params![user_id, date_str],
                Self::progress_log_from_row,
            )
            .optional()?)
    }

    pub fn get_progress_logs(&self, user_id: &str, range: DateRange) -> Result<Vec<ProgressLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, weight_kg, steps, water_ml, updated_at FROM progress_logs
             WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
        )?;
        let logs = stmt
            .query_map(
                params![
                    user_id,
                    range.start.format(DATE_FMT).to_string(),
                    range.end.format(DATE_FMT).to_string()
                ],
                Self::progress_log_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Earliest date with a completed task or a progress log.
    pub fn first_activity_date(&self, user_id: &str) -> Result<Option<NaiveDate>> {
        let raw: Option<String> = self.conn.query_row(
            "SELECT MIN(date) FROM (
                SELECT date FROM tasks WHERE user_id = ?1 AND completed = 1
                UNION ALL
                SELECT date FROM progress_logs WHERE user_id = ?1
             )",
            params![user_id],
            |row| row.get(0),
        )?;
        raw.map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FMT)
                .map_err(|e| PlanError::Validation(format!("stored date '{s}': {e}")))
        })
        .transpose()
    }

    /// Completed tasks and logged measurements in `range`, as progress events.
    pub fn completion_events(&self, user_id: &str, range: DateRange) -> Result<Vec<CompletionEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, kind, duration_minutes FROM tasks
             WHERE user_id = ?1 AND completed = 1 AND date BETWEEN ?2 AND ?3
             ORDER BY date, id",
        )?;
        let rows = stmt
            .query_map(
                params![
                    user_id,
                    range.start.format(DATE_FMT).to_string(),
                    range.end.format(DATE_FMT).to_string()
                ],
                |row| {
                    let kind: String = row.get(1)?;
                    let kind: TaskKind = kind.parse().map_err(|e| conversion_error(1, e))?;
                    let minutes: Option<u32> = row.get(2)?;
                    Ok((date_col(row, 0)?, kind, minutes))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut events: Vec<CompletionEvent> = rows
            .into_iter()
            .map(|(date, kind, minutes)| {
                let kind = match kind {
                    TaskKind::Meal => EventKind::MealCompleted,
                    TaskKind::Workout => EventKind::WorkoutCompleted {
                        minutes: minutes.unwrap_or(0),
                    },
                    TaskKind::Water => EventKind::WaterGoalCompleted,
                    TaskKind::Sleep => EventKind::SleepCompleted,
                };
                CompletionEvent::new(date, kind)
            })
            .collect();

        for log in self.get_progress_logs(user_id, range)? {
            if let Some(kg) = log.weight_kg {
                events.push(CompletionEvent::new(log.date, EventKind::WeightLogged { kg }));
            }
            if let Some(steps) = log.steps {
                events.push(CompletionEvent::new(log.date, EventKind::StepsLogged { steps }));
            }
            if let Some(ml) = log.water_ml {
                events.push(CompletionEvent::new(log.date, EventKind::WaterLogged { ml }));
            }
        }
        Ok(events)
    }
}
