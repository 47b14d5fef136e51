use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use super::clock::Clock;
use super::store::{NewSession, RecordStore, StoreError};
use crate::model::attendance::Attendance;

/// Lookback window for an open record to still count as the active session.
pub const ACTIVE_SESSION_WINDOW_SECS: i64 = 14_400;
/// Mandatory gap between the close of one session and the next check-in.
pub const COOLDOWN_SECS: i64 = 1_800;
/// Maximum sessions per member per calendar date.
pub const DAILY_SESSION_CAP: usize = 2;

#[derive(Debug)]
pub enum ScanOutcome {
    CheckIn {
        session: Attendance,
    },
    CheckOut {
        session: Attendance,
        duration_seconds: i64,
    },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Maximum 2 sessions per day allowed. Come back tomorrow!")]
    DailyLimitExceeded,
    #[error("Please wait {minutes_left} minutes before starting a new session.")]
    CooldownActive { minutes_left: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decides whether an incoming scan is a check-in or a check-out.
///
/// An open record created within the last 4 hours is the member's active
/// session and a scan closes it. Otherwise the scan opens a new session,
/// subject to the 2-per-day cap and the 30-minute cooldown after the
/// previous same-day close. Exactly one store write per accepted scan,
/// none on a rejection.
pub struct SessionController {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    zone: FixedOffset,
    // Per-member guards serializing the read-then-write below: a double-tap
    // scan must never observe "no active session" twice.
    member_locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionController {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, zone: FixedOffset) -> Self {
        Self {
            store,
            clock,
            zone,
            member_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Calendar date of `at` in the reference zone; the per-day bucket.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.zone).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }

    fn member_lock(&self, member_id: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .member_locks
            .lock()
            .expect("member lock registry poisoned");
        locks.entry(member_id).or_default().clone()
    }

    pub async fn process_scan(&self, member_id: u64) -> Result<ScanOutcome, ScanError> {
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let today = self.local_date(now);
        let since = now - Duration::seconds(ACTIVE_SESSION_WINDOW_SECS);

        if let Some(open) = self.store.find_active_session(member_id, since).await? {
            // Check-out. The conditional close fails if the record was
            // closed in the meantime, so an earlier out_time is never
            // overwritten.
            let duration_seconds = (now - open.in_time).num_seconds();
            self.store
                .update_close(open.id, now, duration_seconds)
                .await?;

            debug!(member_id, record_id = open.id, duration_seconds, "session closed");

            let session = Attendance {
                out_time: Some(now),
                duration_seconds: Some(duration_seconds),
                ..open
            };
            return Ok(ScanOutcome::CheckOut {
                session,
                duration_seconds,
            });
        }

        // Check-in path: enforce the daily cap and cooldown before writing.
        // An open record older than the window is deliberately left alone;
        // only an administrator closes those.
        let todays = self.store.find_by_member_and_date(member_id, today).await?;

        if todays.len() >= DAILY_SESSION_CAP {
            return Err(ScanError::DailyLimitExceeded);
        }

        if let Some(last) = todays.last() {
            if let Some(out_time) = last.out_time {
                let elapsed = (now - out_time).num_seconds();
                if elapsed < COOLDOWN_SECS {
                    let minutes_left = (COOLDOWN_SECS - elapsed + 59).div_euclid(60);
                    return Err(ScanError::CooldownActive { minutes_left });
                }
            }
        }

        let id = self
            .store
            .insert(NewSession {
                member_id,
                in_time: now,
                date: today,
            })
            .await?;

        debug!(member_id, record_id = id, "session opened");

        Ok(ScanOutcome::CheckIn {
            session: Attendance {
                id,
                member_id,
                in_time: now,
                out_time: None,
                duration_seconds: None,
                date: today,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{ManualClock, MemoryRecordStore};
    use chrono::TimeZone;

    const MEMBER: u64 = 7;

    fn kolkata() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn setup(start: DateTime<Utc>) -> (Arc<MemoryRecordStore>, Arc<ManualClock>, SessionController) {
        let store = Arc::new(MemoryRecordStore::new());
        let clock = Arc::new(ManualClock::new(start));
        let controller = SessionController::new(store.clone(), clock.clone(), kolkata());
        (store, clock, controller)
    }

    // 09:00 local time, leaving the whole local day ahead.
    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 3, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn first_scan_opens_a_session() {
        let (store, _clock, controller) = setup(morning());

        let outcome = controller.process_scan(MEMBER).await.unwrap();
        let ScanOutcome::CheckIn { session } = outcome else {
            panic!("expected check-in");
        };

        assert_eq!(session.in_time, morning());
        assert!(session.is_open());
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_open());
    }

    #[tokio::test]
    async fn second_scan_closes_with_floored_duration() {
        let (store, clock, controller) = setup(morning());

        controller.process_scan(MEMBER).await.unwrap();
        // 90 minutes and change; sub-second remainder must be truncated.
        clock.advance(Duration::milliseconds(90 * 60 * 1000 + 900));

        let outcome = controller.process_scan(MEMBER).await.unwrap();
        let ScanOutcome::CheckOut {
            session,
            duration_seconds,
        } = outcome
        else {
            panic!("expected check-out");
        };

        assert_eq!(duration_seconds, 5_400);
        assert_eq!(session.duration_seconds, Some(5_400));
        assert_eq!(session.out_time, Some(clock.now()));

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_seconds, Some(5_400));
    }

    #[tokio::test]
    async fn daily_cap_blocks_a_third_session() {
        let (store, clock, controller) = setup(morning());

        controller.process_scan(MEMBER).await.unwrap(); // check-in 1
        clock.advance(Duration::hours(1));
        controller.process_scan(MEMBER).await.unwrap(); // check-out 1
        clock.advance(Duration::minutes(31));
        controller.process_scan(MEMBER).await.unwrap(); // check-in 2
        clock.advance(Duration::hours(1));
        controller.process_scan(MEMBER).await.unwrap(); // check-out 2

        // Third attempt fails regardless of how much time passes within the
        // same local day, and writes nothing.
        for wait in [Duration::minutes(31), Duration::hours(3)] {
            clock.advance(wait);
            let err = controller.process_scan(MEMBER).await.unwrap_err();
            assert!(matches!(err, ScanError::DailyLimitExceeded));
            assert_eq!(store.records().len(), 2);
        }
    }

    #[tokio::test]
    async fn cooldown_minutes_left_rounds_up_and_decreases() {
        let (store, clock, controller) = setup(morning());

        controller.process_scan(MEMBER).await.unwrap();
        clock.advance(Duration::hours(1));
        controller.process_scan(MEMBER).await.unwrap(); // closed at T

        // (elapsed seconds, expected whole minutes left)
        for (elapsed, expected) in [(0, 30), (1, 30), (60, 29), (1_740, 1), (1_799, 1)] {
            clock.set(morning() + Duration::hours(1) + Duration::seconds(elapsed));
            let err = controller.process_scan(MEMBER).await.unwrap_err();
            let ScanError::CooldownActive { minutes_left } = err else {
                panic!("expected cooldown at {elapsed}s elapsed");
            };
            assert_eq!(minutes_left, expected, "elapsed {elapsed}s");
            assert_eq!(store.records().len(), 1, "rejection must not write");
        }

        // Exactly 30 minutes later the cooldown has elapsed.
        clock.set(morning() + Duration::hours(1) + Duration::seconds(COOLDOWN_SECS));
        let outcome = controller.process_scan(MEMBER).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::CheckIn { .. }));
    }

    #[tokio::test]
    async fn stale_open_session_is_not_reused_or_closed() {
        let (store, clock, controller) = setup(morning());

        controller.process_scan(MEMBER).await.unwrap();
        clock.advance(Duration::hours(5));

        let outcome = controller.process_scan(MEMBER).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::CheckIn { .. }));

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_open(), "stale record must stay open");
        assert!(records[1].is_open());
    }

    #[tokio::test]
    async fn insert_failure_persists_nothing() {
        let (store, _clock, controller) = setup(morning());
        store.fail_writes(true);

        let err = controller.process_scan(MEMBER).await.unwrap_err();
        assert!(matches!(err, ScanError::Store(_)));
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn close_replay_fails_and_preserves_the_first_close() {
        let (store, clock, controller) = setup(morning());

        controller.process_scan(MEMBER).await.unwrap();
        clock.advance(Duration::hours(1));
        let ScanOutcome::CheckOut { session, .. } = controller.process_scan(MEMBER).await.unwrap()
        else {
            panic!("expected check-out");
        };

        let replay = store
            .update_close(session.id, clock.now() + Duration::hours(1), 7_200)
            .await;
        assert!(matches!(replay, Err(StoreError::NotFound)));

        let records = store.records();
        assert_eq!(records[0].out_time, session.out_time);
        assert_eq!(records[0].duration_seconds, session.duration_seconds);
    }

    #[tokio::test]
    async fn concurrent_scans_never_leave_two_open_records() {
        let (store, _clock, controller) = setup(morning());
        let controller = Arc::new(controller);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let controller = controller.clone();
            tasks.push(tokio::spawn(
                async move { controller.process_scan(MEMBER).await },
            ));
        }

        let mut check_ins = 0;
        let mut check_outs = 0;
        let mut rejections = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(ScanOutcome::CheckIn { .. }) => check_ins += 1,
                Ok(ScanOutcome::CheckOut { .. }) => check_outs += 1,
                Err(ScanError::CooldownActive { .. }) => rejections += 1,
                Err(other) => panic!("unexpected rejection: {other}"),
            }
        }

        // The per-member lock serializes the burst: one record opened, then
        // closed, then everything else hits the cooldown.
        assert_eq!(check_ins, 1);
        assert_eq!(check_outs, 1);
        assert_eq!(rejections, 6);
        assert!(store.open_count() <= 1);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn dates_bucket_in_the_reference_zone() {
        // 19:30 UTC is 01:00 the next day in +05:30.
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 19, 30, 0).unwrap();
        let (store, clock, controller) = setup(start);

        controller.process_scan(MEMBER).await.unwrap();
        assert_eq!(
            store.records()[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
        );

        clock.advance(Duration::hours(1));
        controller.process_scan(MEMBER).await.unwrap(); // check-out
        clock.advance(Duration::minutes(31));
        controller.process_scan(MEMBER).await.unwrap(); // check-in 2
        clock.advance(Duration::hours(1));
        controller.process_scan(MEMBER).await.unwrap(); // check-out 2

        clock.advance(Duration::minutes(31));
        let err = controller.process_scan(MEMBER).await.unwrap_err();
        assert!(matches!(err, ScanError::DailyLimitExceeded));

        // Next local day (still March 11 in UTC): the cap resets.
        clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 19, 30, 0).unwrap());
        let outcome = controller.process_scan(MEMBER).await.unwrap();
        let ScanOutcome::CheckIn { session } = outcome else {
            panic!("expected check-in");
        };
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
    }

    #[tokio::test]
    async fn checkout_works_across_local_midnight() {
        // Check in at 22:30 local, check out at 01:00 local the next day.
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 17, 0, 0).unwrap();
        let (store, clock, controller) = setup(start);

        controller.process_scan(MEMBER).await.unwrap();
        clock.advance(Duration::minutes(150));

        let outcome = controller.process_scan(MEMBER).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::CheckOut { .. }));

        // The date bucket is the day the session began.
        assert_eq!(
            store.records()[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
    }
}
