use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;

use crate::{auth::auth::AuthMember, models::MemberSearchQuery};

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct MemberRow {
    id: u64,
    name: String,
    phone: String,
    email: Option<String>,
    role: String,
    is_active: bool,
    join_date: chrono::DateTime<chrono::Utc>,
}

/// Member directory with optional search (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/members",
    responses(
        (status = 200, description = "Members matching the search"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_members(
    auth: AuthMember,
    query: web::Query<MemberSearchQuery>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    if !auth.is_admin() {
        return HttpResponse::Forbidden().json(json!({
            "success": false,
            "message": "Access denied. Admin privileges required.",
        }));
    }

    let limit = i64::from(query.limit.unwrap_or(100).min(1000));
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut builder = sqlx::QueryBuilder::new(
        "SELECT id, name, phone, email, role, is_active, join_date FROM members WHERE 1 = 1",
    );
    let mut count_builder = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM members WHERE 1 = 1");

    if let Some(search) = search {
        let pattern = format!("%{search}%");
        for b in [&mut builder, &mut count_builder] {
            b.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR phone LIKE ")
                .push_bind(pattern.clone())
                .push(" OR email LIKE ")
                .push_bind(pattern.clone())
                .push(")");
        }
    }
    builder.push(" ORDER BY join_date DESC LIMIT ").push_bind(limit);

    let members = builder
        .build_query_as::<MemberRow>()
        .fetch_all(pool.get_ref())
        .await;
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await;

    match (members, total) {
        (Ok(members), Ok(total)) => HttpResponse::Ok().json(json!({
            "success": true,
            "members": members,
            "total": total,
        })),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "member listing failed");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server error fetching members.",
            }))
        }
    }
}
