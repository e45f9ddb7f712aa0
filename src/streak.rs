//! Streak and progress accumulation.
//!
//! [`accumulate`] is the only place a [`UserStats`] aggregate is derived from a
//! new scored entry. It is pure: the database applies the returned record in
//! the same transaction that inserts the entry.

use crate::aggregation::round_to;
use crate::calendar::DayKey;
use crate::models::{StreakUpdate, UserStats};
use chrono::{DateTime, Utc};

/// Running-mean progress never reaches 100 on its own.
pub const PROGRESS_CAP: f64 = 99.0;
/// Reserved for an explicitly completed goal.
pub const COMPLETED_PROGRESS: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulation {
    pub stats: UserStats,
    pub update: StreakUpdate,
}

pub fn compute_progress(total_score: f64, total_entries: u32) -> f64 {
    if total_entries == 0 {
        return 0.0;
    }
    let average = total_score / f64::from(total_entries);
    round_to(average, 1).min(PROGRESS_CAP)
}

pub fn accumulate(
    existing: Option<&UserStats>,
    user_id: &str,
    goal_id: &str,
    today: DayKey,
    total_score: f64,
    now: DateTime<Utc>,
) -> Accumulation {
    // An aggregate recorded for another goal does not carry over.
    let Some(stats) = existing.filter(|stats| stats.goal_id == goal_id) else {
        let stats = UserStats {
            user_id: user_id.to_string(),
            goal_id: goal_id.to_string(),
            current_streak: 1,
            longest_streak: 1,
            total_score,
            total_entries: 1,
            last_entry_date: Some(today),
            progress_percent: compute_progress(total_score, 1),
            updated_at: now,
        };
        return Accumulation {
            stats,
            update: StreakUpdate {
                current_streak: 1,
                longest_streak: 1,
                is_new: true,
            },
        };
    };

    let finalized = stats.progress_percent >= COMPLETED_PROGRESS;
    let new_total = stats.total_score + total_score;

    if stats
        .last_entry_date
        .map(|last| last.is_same_day(today))
        .unwrap_or(false)
    {
        let progress_percent = if finalized {
            COMPLETED_PROGRESS
        } else {
            compute_progress(new_total, stats.total_entries)
        };
        return Accumulation {
            stats: UserStats {
                total_score: new_total,
                progress_percent,
                updated_at: now,
                ..stats.clone()
            },
            update: StreakUpdate {
                current_streak: stats.current_streak,
                longest_streak: stats.longest_streak,
                is_new: false,
            },
        };
    }

    let continues = stats
        .last_entry_date
        .map(|last| last.is_day_before(today))
        .unwrap_or(false);
    let current_streak = if continues {
        stats.current_streak.saturating_add(1)
    } else {
        1
    };
    let longest_streak = stats.longest_streak.max(current_streak);
    let total_entries = stats.total_entries.saturating_add(1);
    let progress_percent = if finalized {
        COMPLETED_PROGRESS
    } else {
        compute_progress(new_total, total_entries)
    };

    Accumulation {
        stats: UserStats {
            user_id: stats.user_id.clone(),
            goal_id: stats.goal_id.clone(),
            current_streak,
            longest_streak,
            total_score: new_total,
            total_entries,
            last_entry_date: Some(today),
            progress_percent,
            updated_at: now,
        },
        update: StreakUpdate {
            current_streak,
            longest_streak,
            is_new: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{accumulate, compute_progress, COMPLETED_PROGRESS, PROGRESS_CAP};
    use crate::calendar::DayKey;
    use crate::models::UserStats;
    use chrono::{NaiveDate, Utc};

    fn day(d: u32) -> DayKey {
        DayKey::from_date(NaiveDate::from_ymd_opt(2026, 3, d).expect("valid date"))
    }

    fn submit(stats: Option<&UserStats>, today: DayKey, score: f64) -> super::Accumulation {
        accumulate(stats, "user-1", "goal-1", today, score, Utc::now())
    }

    #[test]
    fn consecutive_days_then_gap_follow_reference_scenario() {
        let first = submit(None, day(1), 60.0);
        assert_eq!(first.update.current_streak, 1);
        assert_eq!(first.update.longest_streak, 1);
        assert!(first.update.is_new);
        assert_eq!(first.stats.progress_percent, 60.0);

        let second = submit(Some(&first.stats), day(2), 80.0);
        assert_eq!(second.update.current_streak, 2);
        assert_eq!(second.update.longest_streak, 2);
        assert_eq!(second.stats.progress_percent, 70.0);

        let fourth = submit(Some(&second.stats), day(4), 50.0);
        assert_eq!(fourth.update.current_streak, 1);
        assert_eq!(fourth.update.longest_streak, 2);
        assert_eq!(fourth.stats.progress_percent, 63.3);
        assert_eq!(fourth.stats.total_entries, 3);
        assert_eq!(fourth.stats.last_entry_date, Some(day(4)));
    }

    #[test]
    fn same_day_resubmission_only_accumulates_score() {
        let first = submit(None, day(1), 40.0);
        let again = submit(Some(&first.stats), day(1), 30.0);
        assert!(!again.update.is_new);
        assert_eq!(again.stats.total_entries, 1);
        assert_eq!(again.stats.current_streak, 1);
        assert_eq!(again.stats.longest_streak, 1);
        assert_eq!(again.stats.total_score, 70.0);
        assert_eq!(again.stats.last_entry_date, Some(day(1)));
    }

    #[test]
    fn streak_matches_run_of_consecutive_days() {
        let mut stats: Option<UserStats> = None;
        for d in 1..=10 {
            let next = submit(stats.as_ref(), day(d), 50.0);
            assert_eq!(next.stats.current_streak, d);
            assert!(next.stats.longest_streak >= next.stats.current_streak);
            stats = Some(next.stats);
        }
    }

    #[test]
    fn gap_resets_current_but_keeps_longest() {
        let mut stats: Option<UserStats> = None;
        for d in 1..=3 {
            stats = Some(submit(stats.as_ref(), day(d), 50.0).stats);
        }
        let after_gap = submit(stats.as_ref(), day(6), 50.0);
        assert_eq!(after_gap.stats.current_streak, 1);
        assert_eq!(after_gap.stats.longest_streak, 3);
    }

    #[test]
    fn missing_last_entry_date_resets_streak() {
        let mut stats = submit(None, day(1), 50.0).stats;
        stats.current_streak = 4;
        stats.longest_streak = 4;
        stats.last_entry_date = None;
        let next = submit(Some(&stats), day(2), 50.0);
        assert_eq!(next.stats.current_streak, 1);
        assert_eq!(next.stats.longest_streak, 4);
        assert_eq!(next.stats.total_entries, 2);
    }

    #[test]
    fn aggregate_from_another_goal_starts_fresh() {
        let other = accumulate(None, "user-1", "goal-old", day(1), 90.0, Utc::now());
        let next = submit(Some(&other.stats), day(2), 40.0);
        assert_eq!(next.stats.goal_id, "goal-1");
        assert_eq!(next.stats.total_entries, 1);
        assert_eq!(next.stats.current_streak, 1);
        assert_eq!(next.stats.progress_percent, 40.0);
    }

    #[test]
    fn progress_is_capped_below_completion() {
        assert_eq!(compute_progress(100.0, 1), PROGRESS_CAP);
        assert_eq!(compute_progress(0.0, 0), 0.0);
        let mut previous = 0.0;
        for total in [10.0, 20.0, 55.5, 99.2, 150.0, 300.0] {
            let progress = compute_progress(total, 2);
            assert!(progress >= previous);
            assert!(progress <= PROGRESS_CAP);
            previous = progress;
        }
    }

    #[test]
    fn finalized_progress_is_kept() {
        let mut stats = submit(None, day(1), 50.0).stats;
        stats.progress_percent = COMPLETED_PROGRESS;
        let next = submit(Some(&stats), day(2), 10.0);
        assert_eq!(next.stats.progress_percent, COMPLETED_PROGRESS);
        assert_eq!(next.stats.current_streak, 2);
    }
}
