use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::MySqlPool;

#[derive(Debug, sqlx::FromRow)]
pub struct Member {
    pub id: u64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
    pub role: String,
    pub is_active: bool,
    pub join_date: DateTime<Utc>,
}

const MEMBER_COLUMNS: &str =
    "id, name, phone, email, password, role, is_active, join_date";

impl Member {
    pub async fn find_active(pool: &MySqlPool, id: u64) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE id = ? AND is_active = TRUE"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_active_by_phone(
        pool: &MySqlPool,
        phone: &str,
    ) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE phone = ? AND is_active = TRUE"
        ))
        .bind(phone)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_admin_by_phone(
        pool: &MySqlPool,
        phone: &str,
    ) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE phone = ? AND role = 'admin'"
        ))
        .bind(phone)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// JSON projection sent to clients; never includes the password hash.
    pub fn public_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "phone": self.phone,
            "email": self.email,
            "role": self.role,
            "joinDate": self.join_date,
        })
    }
}
