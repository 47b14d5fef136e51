use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// One gym visit. `out_time` absent means the session is still open;
/// `duration_seconds` is set exactly once, when the session is closed.
/// `date` is the local calendar date (reference zone) the session began on,
/// derived at creation and never recomputed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: u64,
    pub member_id: u64,
    pub in_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    pub date: NaiveDate,
}

impl Attendance {
    pub fn is_open(&self) -> bool {
        self.out_time.is_none()
    }
}
