use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "9876543210")]
    pub phone: String,
    #[schema(example = "john@email.com")]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReq {
    #[schema(example = "9876543210")]
    pub phone: String,
    pub password: String,
}

/// Credential-carrying scan request used by the public QR endpoint.
#[derive(Deserialize, ToSchema)]
pub struct QrScanReq {
    #[schema(example = "9876543210")]
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub member_id: u64,
    pub role: String,
    pub exp: usize,
    pub jti: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AllAttendanceQuery {
    /// Local calendar date filter, `YYYY-MM-DD`.
    #[param(value_type = Option<String>)]
    pub date: Option<chrono::NaiveDate>,
    /// Member name or phone substring.
    pub member: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MemberSearchQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
}
