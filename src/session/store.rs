use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::MySqlPool;
use thiserror::Error;

use crate::model::attendance::Attendance;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record to close does not exist or already has an out time.
    #[error("attendance record not found or already closed")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A new, still-open attendance record.
pub struct NewSession {
    pub member_id: u64,
    pub in_time: DateTime<Utc>,
    pub date: NaiveDate,
}

/// Durable storage of attendance records, queryable by member and time
/// range, with an atomic close of a single open record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The member's open record with `in_time` at or after `since`, if any.
    async fn find_active_session(
        &self,
        member_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Option<Attendance>, StoreError>;

    /// All of the member's records for the given calendar date, oldest first.
    async fn find_by_member_and_date(
        &self,
        member_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<Attendance>, StoreError>;

    async fn insert(&self, session: NewSession) -> Result<u64, StoreError>;

    /// Close an open record. Fails with `NotFound` if the record does not
    /// exist or was already closed; an earlier close is never overwritten.
    async fn update_close(
        &self,
        id: u64,
        out_time: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError>;
}

pub struct MySqlRecordStore {
    pool: MySqlPool,
}

impl MySqlRecordStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    async fn find_active_session(
        &self,
        member_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Option<Attendance>, StoreError> {
        let record = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, member_id, in_time, out_time, duration_seconds, date
            FROM attendance
            WHERE member_id = ? AND in_time >= ? AND out_time IS NULL
            ORDER BY in_time DESC
            LIMIT 1
            "#,
        )
        .bind(member_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_member_and_date(
        &self,
        member_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<Attendance>, StoreError> {
        let records = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, member_id, in_time, out_time, duration_seconds, date
            FROM attendance
            WHERE member_id = ? AND date = ?
            ORDER BY in_time ASC, id ASC
            "#,
        )
        .bind(member_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert(&self, session: NewSession) -> Result<u64, StoreError> {
        let result =
            sqlx::query("INSERT INTO attendance (member_id, in_time, date) VALUES (?, ?, ?)")
                .bind(session.member_id)
                .bind(session.in_time)
                .bind(session.date)
                .execute(&self.pool)
                .await?;

        Ok(result.last_insert_id())
    }

    async fn update_close(
        &self,
        id: u64,
        out_time: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET out_time = ?, duration_seconds = ?
            WHERE id = ? AND out_time IS NULL
            "#,
        )
        .bind(out_time)
        .bind(duration_seconds)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
