use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::clock::Clock;
use super::store::{NewSession, RecordStore, StoreError};
use crate::model::attendance::Attendance;

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory record store mirroring the MySQL implementation's semantics,
/// including the conditional close. Writes can be made to fail to exercise
/// the store-error paths.
pub struct MemoryRecordStore {
    records: Mutex<Vec<Attendance>>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Attendance> {
        self.records.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_open())
            .count()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_active_session(
        &self,
        member_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Option<Attendance>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.member_id == member_id && r.is_open() && r.in_time >= since)
            .max_by_key(|r| (r.in_time, r.id))
            .cloned())
    }

    async fn find_by_member_and_date(
        &self,
        member_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<Attendance>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut matching: Vec<Attendance> = records
            .iter()
            .filter(|r| r.member_id == member_id && r.date == date)
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.in_time, r.id));
        Ok(matching)
    }

    async fn insert(&self, session: NewSession) -> Result<u64, StoreError> {
        self.check_writable()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().push(Attendance {
            id,
            member_id: session.member_id,
            in_time: session.in_time,
            out_time: None,
            duration_seconds: None,
            date: session.date,
        });
        Ok(id)
    }

    async fn update_close(
        &self,
        id: u64,
        out_time: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id && r.is_open()) {
            Some(record) => {
                record.out_time = Some(out_time);
                record.duration_seconds = Some(duration_seconds);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}
