use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::constants::REWARD_TICK_INTERVAL_SECS;
use crate::points::service::{PointService, WeeklyPayout};

/// One Monday-aligned reward week: `[start, end)` plus the key that marks it
/// paid.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub key: String,
}

impl RewardPeriod {
    /// The most recently *completed* week relative to `today`: the window from
    /// the previous Monday 00:00 up to the current week's Monday 00:00. The
    /// key is the ISO date of the window's first day. Monday-anchored
    /// regardless of which weekday the job happens to run on.
    pub fn last_completed_week(today: NaiveDate) -> Self {
        let days_into_week = i64::from(today.weekday().num_days_from_monday());
        let this_monday = today - chrono::Duration::days(days_into_week);
        let start_date = this_monday - chrono::Duration::days(7);

        Self {
            start: start_date.and_time(NaiveTime::MIN),
            end: this_monday.and_time(NaiveTime::MIN),
            key: start_date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Recurring payout job for the weekly quiz leaderboard. Constructed and
/// spawned by the composition root with its [`PointService`] injected; runs
/// for the process lifetime.
///
/// Every tick re-derives the last completed week and delegates to
/// [`PointService::weekly_quiz_reward`], which is idempotent per period, so a
/// 6-hour cadence only determines how soon after Monday midnight the payout
/// lands.
pub struct WeeklyRewardScheduler {
    service: PointService,
    tick_interval: Duration,
}

impl WeeklyRewardScheduler {
    pub fn new(service: PointService) -> Self {
        Self {
            service,
            tick_interval: Duration::from_secs(REWARD_TICK_INTERVAL_SECS),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_interval);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }

    #[instrument(skip(self))]
    async fn tick(&self) {
        let period = RewardPeriod::last_completed_week(Local::now().date_naive());

        match self.service.weekly_quiz_reward(&period).await {
            Ok(WeeklyPayout::Paid { winner, amount }) => {
                tracing::info!(period = period.key, winner = winner.0, amount, "weekly reward paid");
            }
            Ok(WeeklyPayout::AlreadyPaid) => {
                tracing::debug!(period = period.key, "weekly reward already paid");
            }
            Ok(WeeklyPayout::NoScores) => {
                tracing::debug!(period = period.key, "no quiz plays in period, skipping");
            }
            Err(e) => {
                tracing::error!(error = ?e, period = period.key, "weekly reward tick failure");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_midweek_run_targets_previous_week() {
        // Wednesday 2026-08-26; the completed week is Mon 17th..Mon 24th
        let period = RewardPeriod::last_completed_week(date(2026, 8, 26));

        assert_eq!(period.key, "2026-08-17");
        assert_eq!(period.start, date(2026, 8, 17).and_time(NaiveTime::MIN));
        assert_eq!(period.end, date(2026, 8, 24).and_time(NaiveTime::MIN));
    }

    #[test]
    fn test_sunday_run_stays_monday_anchored() {
        // Sunday 2026-08-30 still belongs to the week starting Mon 24th, so
        // the last completed week is still 17th..24th
        let period = RewardPeriod::last_completed_week(date(2026, 8, 30));

        assert_eq!(period.key, "2026-08-17");
        assert_eq!(period.end, date(2026, 8, 24).and_time(NaiveTime::MIN));
    }

    #[test]
    fn test_monday_run_pays_the_week_that_just_ended() {
        let period = RewardPeriod::last_completed_week(date(2026, 8, 24));

        assert_eq!(period.key, "2026-08-17");
        assert_eq!(period.end, date(2026, 8, 24).and_time(NaiveTime::MIN));
    }

    #[test]
    fn test_window_spans_exactly_seven_days() {
        for day in 1..=28 {
            let period = RewardPeriod::last_completed_week(date(2026, 9, day));
            assert_eq!(period.end - period.start, chrono::Duration::days(7));
        }
    }

    #[test]
    fn test_consecutive_weeks_get_distinct_keys() {
        let a = RewardPeriod::last_completed_week(date(2026, 8, 26));
        let b = RewardPeriod::last_completed_week(date(2026, 9, 2));

        assert_ne!(a.key, b.key);
        assert_eq!(a.end, b.start);
    }
}
