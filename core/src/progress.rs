use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{PlanError, Result};
use crate::models::{
    CompletionEvent, DateRange, EventKind, PeriodTotals, ProgressRecord, ProgressSummary,
    WeeklyTotals,
};

/// Longest range the aggregator accepts, about ten years.
pub const MAX_RANGE_DAYS: i64 = 3660;

/// What a day needs to count toward the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakPolicy {
    pub meals_required: u32,
    pub require_workout: bool,
    pub require_water: bool,
    /// Treat a non-qualifying final day as still in progress: it carries the
    /// previous streak instead of resetting it.
    pub pending_last_day: bool,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        Self {
            meals_required: 4,
            require_workout: true,
            require_water: true,
            pending_last_day: false,
        }
    }
}

impl StreakPolicy {
    #[must_use]
    pub fn qualifies(&self, day: &ProgressRecord) -> bool {
        day.meals_completed >= self.meals_required
            && (!self.require_workout || day.workout_completed)
            && (!self.require_water || day.water_goal_completed)
    }

    /// 0-100: meals 40, workout 30, water 20, sleep 10.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn fitness_score(&self, day: &ProgressRecord) -> u32 {
        let meal_fraction = if self.meals_required == 0 {
            1.0
        } else {
            (f64::from(day.meals_completed) / f64::from(self.meals_required)).min(1.0)
        };
        let score = 40.0 * meal_fraction
            + if day.workout_completed { 30.0 } else { 0.0 }
            + if day.water_goal_completed { 20.0 } else { 0.0 }
            + if day.sleep_completed { 10.0 } else { 0.0 };
        score.round() as u32
    }
}

fn empty_record(date: NaiveDate) -> ProgressRecord {
    ProgressRecord {
        date,
        weight_kg: None,
        steps: None,
        water_ml: None,
        workout_minutes: 0,
        meals_completed: 0,
        workout_completed: false,
        water_goal_completed: false,
        sleep_completed: false,
        qualifies: false,
        fitness_score: 0,
        streak_current: 0,
        streak_max: 0,
    }
}

fn apply_event(day: &mut ProgressRecord, kind: EventKind) {
    match kind {
        EventKind::MealCompleted => day.meals_completed += 1,
        EventKind::WorkoutCompleted { minutes } => {
            day.workout_completed = true;
            day.workout_minutes += minutes;
        }
        EventKind::WaterGoalCompleted => day.water_goal_completed = true,
        EventKind::SleepCompleted => day.sleep_completed = true,
        EventKind::WeightLogged { kg } => day.weight_kg = Some(kg),
        EventKind::StepsLogged { steps } => day.steps = Some(day.steps.unwrap_or(0) + steps),
        EventKind::WaterLogged { ml } => day.water_ml = Some(day.water_ml.unwrap_or(0) + ml),
    }
}

#[derive(Default)]
struct Accumulator {
    workouts: u32,
    workout_minutes: u32,
    meals_completed: u32,
    water_total: u64,
    water_days: u32,
    total_steps: u64,
    latest_weight_kg: Option<f64>,
    qualifying_days: u32,
}

impl Accumulator {
    fn add(&mut self, day: &ProgressRecord) {
        if day.workout_completed {
            self.workouts += 1;
        }
        self.workout_minutes += day.workout_minutes;
        self.meals_completed += day.meals_completed;
        if let Some(ml) = day.water_ml {
            self.water_total += u64::from(ml);
            self.water_days += 1;
        }
        self.total_steps += u64::from(day.steps.unwrap_or(0));
        if day.weight_kg.is_some() {
            self.latest_weight_kg = day.weight_kg;
        }
        if day.qualifies {
            self.qualifying_days += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn avg_water(&self) -> f64 {
        self.water_total as f64 / f64::from(self.water_days.max(1))
    }

    fn into_period(self) -> PeriodTotals {
        PeriodTotals {
            workouts: self.workouts,
            workout_minutes: self.workout_minutes,
            meals_completed: self.meals_completed,
            avg_daily_water_ml: self.avg_water(),
            total_steps: self.total_steps,
            latest_weight_kg: self.latest_weight_kg,
            qualifying_days: self.qualifying_days,
        }
    }
}

/// Aggregate `events` over every date in `range`, including days without
/// events. Events outside the range are ignored.
pub fn aggregate_progress(
    events: &[CompletionEvent],
    range: DateRange,
    policy: &StreakPolicy,
) -> Result<ProgressSummary> {
    aggregate_progress_since(events, range.start, range, policy)
}

/// Like [`aggregate_progress`], but streaks are counted from `history_start`
/// so a streak that began before `range` carries into it. Only the days in
/// `range` are reported.
pub fn aggregate_progress_since(
    events: &[CompletionEvent],
    history_start: NaiveDate,
    range: DateRange,
    policy: &StreakPolicy,
) -> Result<ProgressSummary> {
    let history = DateRange::new(history_start.min(range.start), range.end)?;
    if (history.end - history.start).num_days() >= MAX_RANGE_DAYS {
        return Err(PlanError::Validation(format!(
            "Date range {}..{} exceeds {MAX_RANGE_DAYS} days",
            history.start, history.end
        )));
    }

    let mut by_date: BTreeMap<NaiveDate, ProgressRecord> =
        history.days().map(|d| (d, empty_record(d))).collect();
    for event in events {
        if let Some(day) = by_date.get_mut(&event.date) {
            apply_event(day, event.kind);
        }
    }

    let mut days: Vec<ProgressRecord> = by_date.into_values().collect();
    let last = days.len().saturating_sub(1);
    let mut streak = 0u32;
    let mut best = 0u32;
    for (i, day) in days.iter_mut().enumerate() {
        day.qualifies = policy.qualifies(day);
        day.fitness_score = policy.fitness_score(day);
        if day.qualifies {
            streak += 1;
        } else if !(policy.pending_last_day && i == last) {
            streak = 0;
        }
        best = best.max(streak);
        day.streak_current = streak;
        day.streak_max = best;
    }
    days.retain(|d| range.contains(d.date));

    let mut weeks: Vec<WeeklyTotals> = Vec::new();
    let mut current: Option<(NaiveDate, Accumulator)> = None;
    let mut totals = Accumulator::default();
    for day in &days {
        totals.add(day);
        let week_start =
            day.date - Duration::days(i64::from(day.date.weekday().num_days_from_monday()));
        if let Some((start, acc)) = current.as_mut() {
            if *start == week_start {
                acc.add(day);
                continue;
            }
        }
        if let Some((start, acc)) = current.take() {
            weeks.push(weekly(start, acc));
        }
        let mut acc = Accumulator::default();
        acc.add(day);
        current = Some((week_start, acc));
    }
    if let Some((start, acc)) = current {
        weeks.push(weekly(start, acc));
    }

    Ok(ProgressSummary {
        start: range.start,
        end: range.end,
        streak_current: days.last().map_or(0, |d| d.streak_current),
        streak_max: best,
        days,
        weeks,
        totals: totals.into_period(),
    })
}

fn weekly(week_start: NaiveDate, acc: Accumulator) -> WeeklyTotals {
    let iso = week_start.iso_week();
    let period = acc.into_period();
    WeeklyTotals {
        iso_year: iso.year(),
        iso_week: iso.week(),
        week_start,
        workouts: period.workouts,
        workout_minutes: period.workout_minutes,
        meals_completed: period.meals_completed,
        avg_daily_water_ml: period.avg_daily_water_ml,
        total_steps: period.total_steps,
        latest_weight_kg: period.latest_weight_kg,
        qualifying_days: period.qualifying_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn full_day(d: NaiveDate) -> Vec<CompletionEvent> {
        let mut out = vec![CompletionEvent::new(d, EventKind::MealCompleted); 4];
        out.push(CompletionEvent::new(d, EventKind::WorkoutCompleted { minutes: 30 }));
        out.push(CompletionEvent::new(d, EventKind::WaterGoalCompleted));
        out
    }

    #[test]
    fn test_streak_resets_after_miss() {
        let start = date(2024, 4, 1);
        let mut events = Vec::new();
        for offset in [0, 1, 2, 4] {
            events.extend(full_day(start + Duration::days(offset)));
        }
        let range = DateRange::new(start, start + Duration::days(4)).unwrap();
        let summary = aggregate_progress(&events, range, &StreakPolicy::default()).unwrap();

        let streaks: Vec<u32> = summary.days.iter().map(|d| d.streak_current).collect();
        assert_eq!(streaks, vec![1, 2, 3, 0, 1]);
        assert_eq!(summary.streak_current, 1);
        assert_eq!(summary.streak_max, 3);
        assert_eq!(summary.days[4].streak_max, 3);
    }

    #[test]
    fn test_partial_day_does_not_qualify() {
        let d = date(2024, 4, 1);
        let mut events = full_day(d);
        events.retain(|e| e.kind != EventKind::WaterGoalCompleted);
        events.push(CompletionEvent::new(d, EventKind::SleepCompleted));
        let summary =
            aggregate_progress(&events, DateRange::new(d, d).unwrap(), &StreakPolicy::default())
                .unwrap();
        let day = &summary.days[0];
        assert!(!day.qualifies);
        assert_eq!(day.streak_current, 0);
        assert_eq!(day.fitness_score, 80);
    }

    #[test]
    fn test_pending_last_day_carries_streak() {
        let start = date(2024, 4, 1);
        let mut events = full_day(start);
        events.extend(full_day(start + Duration::days(1)));
        events.push(CompletionEvent::new(
            start + Duration::days(2),
            EventKind::MealCompleted,
        ));
        let range = DateRange::new(start, start + Duration::days(2)).unwrap();

        let strict = aggregate_progress(&events, range, &StreakPolicy::default()).unwrap();
        assert_eq!(strict.streak_current, 0);

        let policy = StreakPolicy {
            pending_last_day: true,
            ..StreakPolicy::default()
        };
        let lenient = aggregate_progress(&events, range, &policy).unwrap();
        assert_eq!(lenient.streak_current, 2);
        assert_eq!(lenient.streak_max, 2);
    }

    #[test]
    fn test_days_without_events_are_present() {
        let range = DateRange::new(date(2024, 4, 1), date(2024, 4, 7)).unwrap();
        let summary = aggregate_progress(&[], range, &StreakPolicy::default()).unwrap();
        assert_eq!(summary.days.len(), 7);
        assert!(summary.days.iter().all(|d| d.fitness_score == 0 && !d.qualifies));
        assert_eq!(summary.streak_max, 0);
        assert!((summary.totals.avg_daily_water_ml - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_events_outside_range_ignored() {
        let range = DateRange::new(date(2024, 4, 2), date(2024, 4, 3)).unwrap();
        let events = full_day(date(2024, 4, 1));
        let summary = aggregate_progress(&events, range, &StreakPolicy::default()).unwrap();
        assert_eq!(summary.totals.meals_completed, 0);
    }

    #[test]
    fn test_weekly_totals_group_by_iso_week() {
        // 2024-04-06 is a Saturday; the range spans two ISO weeks.
        let range = DateRange::new(date(2024, 4, 6), date(2024, 4, 9)).unwrap();
        let events = vec![
            CompletionEvent::new(date(2024, 4, 6), EventKind::WaterLogged { ml: 2000 }),
            CompletionEvent::new(date(2024, 4, 7), EventKind::WaterLogged { ml: 3000 }),
            CompletionEvent::new(date(2024, 4, 7), EventKind::WorkoutCompleted { minutes: 45 }),
            CompletionEvent::new(date(2024, 4, 7), EventKind::WeightLogged { kg: 80.0 }),
            CompletionEvent::new(date(2024, 4, 8), EventKind::StepsLogged { steps: 9000 }),
            CompletionEvent::new(date(2024, 4, 9), EventKind::WeightLogged { kg: 79.5 }),
        ];
        let summary = aggregate_progress(&events, range, &StreakPolicy::default()).unwrap();
        assert_eq!(summary.weeks.len(), 2);

        let first = &summary.weeks[0];
        assert_eq!(first.week_start, date(2024, 4, 1));
        assert_eq!(first.iso_week, 14);
        assert_eq!(first.workouts, 1);
        assert_eq!(first.workout_minutes, 45);
        assert!((first.avg_daily_water_ml - 2500.0).abs() < f64::EPSILON);
        assert_eq!(first.latest_weight_kg, Some(80.0));

        let second = &summary.weeks[1];
        assert_eq!(second.week_start, date(2024, 4, 8));
        assert_eq!(second.total_steps, 9000);
        assert_eq!(second.latest_weight_kg, Some(79.5));

        assert_eq!(summary.totals.latest_weight_kg, Some(79.5));
        assert_eq!(summary.totals.workouts, 1);
    }

    #[test]
    fn test_history_carries_streak_into_window() {
        let start = date(2024, 4, 1);
        let mut events = Vec::new();
        for offset in 0..5 {
            events.extend(full_day(start + Duration::days(offset)));
        }
        let window = DateRange::new(start + Duration::days(3), start + Duration::days(4)).unwrap();
        let summary =
            aggregate_progress_since(&events, start, window, &StreakPolicy::default()).unwrap();
        assert_eq!(summary.days.len(), 2);
        assert_eq!(summary.days[0].streak_current, 4);
        assert_eq!(summary.streak_current, 5);
        assert_eq!(summary.streak_max, 5);
        assert_eq!(summary.totals.meals_completed, 8);

        let plain = aggregate_progress(&events, window, &StreakPolicy::default()).unwrap();
        assert_eq!(plain.streak_current, 2);
    }

    #[test]
    fn test_rejects_huge_range() {
        let range = DateRange::new(date(2000, 1, 1), date(2024, 1, 1)).unwrap();
        assert!(matches!(
            aggregate_progress(&[], range, &StreakPolicy::default()),
            Err(PlanError::Validation(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_streak_invariants(pattern in proptest::collection::vec(any::<bool>(), 1..60)) {
            let start = date(2024, 1, 1);
            let mut events = Vec::new();
            for (i, good) in pattern.iter().enumerate() {
                if *good {
                    events.extend(full_day(start + Duration::days(i as i64)));
                }
            }
            let range = DateRange::new(start, start + Duration::days(pattern.len() as i64 - 1)).unwrap();
            let summary = aggregate_progress(&events, range, &StreakPolicy::default()).unwrap();

            let mut prev_current = 0;
            let mut prev_max = 0;
            for (day, good) in summary.days.iter().zip(&pattern) {
                prop_assert_eq!(day.qualifies, *good);
                if *good {
                    prop_assert_eq!(day.streak_current, prev_current + 1);
                } else {
                    prop_assert_eq!(day.streak_current, 0);
                }
                prop_assert!(day.streak_max >= prev_max);
                prop_assert!(day.streak_current <= day.streak_max);
                prev_current = day.streak_current;
                prev_max = day.streak_max;
            }
            prop_assert_eq!(summary.streak_max, prev_max);
        }
    }
}
