use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;

use crate::{
    auth::{auth::AuthMember, jwt::generate_token, password::verify_password},
    config::Config,
    model::{attendance::Attendance, member::Member},
    models::{AllAttendanceQuery, HistoryQuery, QrScanReq},
    session::controller::{ScanError, ScanOutcome, SessionController},
};

fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({
        "success": false,
        "message": "Access denied. Admin privileges required.",
    }))
}

fn scan_server_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "message": "Server error during check-in/out. Please try again.",
    }))
}

fn scan_success(outcome: ScanOutcome, member_name: &str) -> serde_json::Value {
    match outcome {
        ScanOutcome::CheckIn { session } => json!({
            "success": true,
            "message": format!(
                "Check-in successful! Welcome to Muscle Art Fitness, {member_name}. Have a great workout!"
            ),
            "type": "check-in",
            "session": { "inTime": session.in_time },
        }),
        ScanOutcome::CheckOut {
            session,
            duration_seconds,
        } => {
            let hours = duration_seconds / 3600;
            let minutes = (duration_seconds % 3600) / 60;
            json!({
                "success": true,
                "message": format!(
                    "Check-out successful! Workout duration: {hours}h {minutes}m. Great session!"
                ),
                "type": "check-out",
                "duration": duration_seconds,
                "session": {
                    "inTime": session.in_time,
                    "outTime": session.out_time,
                    "duration": duration_seconds,
                },
            })
        }
    }
}

fn scan_rejection(err: ScanError) -> HttpResponse {
    match err {
        ScanError::DailyLimitExceeded | ScanError::CooldownActive { .. } => {
            // Expected policy outcomes, not operator errors.
            HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": err.to_string(),
            }))
        }
        ScanError::Store(e) => {
            error!(error = %e, "scan failed at the record store");
            scan_server_error()
        }
    }
}

/// Check-in / check-out scan for an authenticated member
#[utoipa::path(
    post,
    path = "/api/attendance/scan",
    responses(
        (status = 200, description = "Scan accepted", body = Object, example = json!({
            "success": true,
            "message": "Check-in successful! Welcome to Muscle Art Fitness, John. Have a great workout!",
            "type": "check-in",
            "session": { "inTime": "2024-05-06T03:30:00Z" }
        })),
        (status = 400, description = "Daily limit reached or cooldown active", body = Object, example = json!({
            "success": false,
            "message": "Please wait 12 minutes before starting a new session."
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn scan(
    auth: AuthMember,
    pool: web::Data<MySqlPool>,
    controller: web::Data<SessionController>,
) -> impl Responder {
    let member = match Member::find_active(pool.get_ref(), auth.member_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "message": "Authentication required. Please login.",
            }));
        }
        Err(e) => {
            error!(error = %e, member_id = auth.member_id, "member lookup failed");
            return scan_server_error();
        }
    };

    match controller.process_scan(member.id).await {
        Ok(outcome) => HttpResponse::Ok().json(scan_success(outcome, &member.name)),
        Err(err) => scan_rejection(err),
    }
}

/// Credential-based QR scan; verifies phone + password, scans, and issues a
/// fresh bearer token
#[utoipa::path(
    post,
    path = "/auth/attendance/qr-scan",
    request_body = QrScanReq,
    responses(
        (status = 200, description = "Scan accepted, token issued"),
        (status = 400, description = "Invalid credentials or policy rejection"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn qr_scan(
    req: web::Json<QrScanReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    controller: web::Data<SessionController>,
) -> impl Responder {
    // Credential verification is a prerequisite; the controller itself only
    // ever sees an authenticated, active member.
    let member = match Member::find_active_by_phone(pool.get_ref(), req.phone.trim()).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": "Member not found. Please register first.",
            }));
        }
        Err(e) => {
            error!(error = %e, "member lookup failed");
            return scan_server_error();
        }
    };

    if !verify_password(&req.password, &member.password) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "Invalid credentials.",
        }));
    }

    match controller.process_scan(member.id).await {
        Ok(outcome) => {
            let token = generate_token(member.id, &member.role, &config.jwt_secret, config.token_ttl);
            let mut body = scan_success(outcome, &member.name);
            body["user"] = member.public_json();
            body["token"] = json!(token);
            HttpResponse::Ok().json(body)
        }
        Err(err) => scan_rejection(err),
    }
}

/// Member's own attendance history, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/my-attendance",
    responses(
        (status = 200, description = "Attendance records with pagination"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthMember,
    query: web::Query<HistoryQuery>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    let limit = i64::from(query.limit.unwrap_or(50).min(500));
    let skip = i64::from(query.skip.unwrap_or(0));

    let records = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, member_id, in_time, out_time, duration_seconds, date
        FROM attendance
        WHERE member_id = ?
        ORDER BY in_time DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(auth.member_id)
    .bind(limit)
    .bind(skip)
    .fetch_all(pool.get_ref())
    .await;

    let total =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE member_id = ?")
            .bind(auth.member_id)
            .fetch_one(pool.get_ref())
            .await;

    match (records, total) {
        (Ok(records), Ok(total)) => HttpResponse::Ok().json(json!({
            "success": true,
            "attendance": records,
            "pagination": {
                "total": total,
                "limit": limit,
                "skip": skip,
                "hasMore": total > skip + limit,
            },
        })),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, member_id = auth.member_id, "attendance history fetch failed");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server error fetching attendance records.",
            }))
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct AttendanceWithMember {
    id: u64,
    member_id: u64,
    in_time: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<i64>,
    date: chrono::NaiveDate,
    name: String,
    phone: String,
    email: Option<String>,
}

/// All attendance records, filterable by date and member (admin only)
#[utoipa::path(
    get,
    path = "/api/attendance/all",
    responses(
        (status = 200, description = "Attendance records with member info"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn all_attendance(
    auth: AuthMember,
    query: web::Query<AllAttendanceQuery>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }

    let limit = i64::from(query.limit.unwrap_or(100).min(1000));

    let mut builder = sqlx::QueryBuilder::new(
        r#"
        SELECT a.id, a.member_id, a.in_time, a.out_time, a.duration_seconds, a.date,
               m.name, m.phone, m.email
        FROM attendance a
        JOIN members m ON m.id = a.member_id
        WHERE 1 = 1
        "#,
    );

    if let Some(date) = query.date {
        builder.push(" AND a.date = ").push_bind(date);
    }
    if let Some(search) = query.member.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder
            .push(" AND (m.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR m.phone LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    builder.push(" ORDER BY a.in_time DESC LIMIT ").push_bind(limit);

    match builder
        .build_query_as::<AttendanceWithMember>()
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(records) => HttpResponse::Ok().json(json!({
            "success": true,
            "attendance": records,
            "count": records.len(),
        })),
        Err(e) => {
            error!(error = %e, "attendance listing failed");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server error fetching attendance records.",
            }))
        }
    }
}

/// Today's headline numbers for the admin dashboard
#[utoipa::path(
    get,
    path = "/api/attendance/stats",
    responses(
        (status = 200, description = "Member count, today's visits, open sessions, average duration"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn stats(
    auth: AuthMember,
    pool: web::Data<MySqlPool>,
    controller: web::Data<SessionController>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }

    let today = controller.today();

    let total_members =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM members WHERE is_active = TRUE")
            .fetch_one(pool.get_ref())
            .await;
    let today_visits =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE date = ?")
            .bind(today)
            .fetch_one(pool.get_ref())
            .await;
    let active_now = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance WHERE date = ? AND out_time IS NULL",
    )
    .bind(today)
    .fetch_one(pool.get_ref())
    .await;
    let avg_duration = sqlx::query_scalar::<_, Option<f64>>(
        r#"
        SELECT CAST(AVG(duration_seconds) AS DOUBLE)
        FROM attendance
        WHERE date = ? AND duration_seconds > 0
        "#,
    )
    .bind(today)
    .fetch_one(pool.get_ref())
    .await;

    match (total_members, today_visits, active_now, avg_duration) {
        (Ok(total_members), Ok(today_visits), Ok(active_now), Ok(avg_duration)) => {
            HttpResponse::Ok().json(json!({
                "success": true,
                "totalMembers": total_members,
                "todayVisits": today_visits,
                "activeNow": active_now,
                "avgDuration": avg_duration.unwrap_or(0.0),
            }))
        }
        (Err(e), ..) | (_, Err(e), ..) | (_, _, Err(e), _) | (.., Err(e)) => {
            error!(error = %e, "stats fetch failed");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server error fetching statistics.",
            }))
        }
    }
}

/// Manually close an abandoned open session (admin only)
#[utoipa::path(
    put,
    path = "/api/attendance/mark-exit/{id}",
    responses(
        (status = 200, description = "Exit marked", body = Object, example = json!({
            "success": true,
            "message": "Exit marked successfully.",
            "duration": 5400
        })),
        (status = 400, description = "Member has already checked out"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_exit(
    auth: AuthMember,
    path: web::Path<u64>,
    pool: web::Data<MySqlPool>,
    controller: web::Data<SessionController>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }

    let id = path.into_inner();

    let record = match sqlx::query_as::<_, Attendance>(
        "SELECT id, member_id, in_time, out_time, duration_seconds, date FROM attendance WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "message": "Attendance record not found.",
            }));
        }
        Err(e) => {
            error!(error = %e, record_id = id, "mark-exit lookup failed");
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server error marking exit.",
            }));
        }
    };

    if !record.is_open() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "Member has already checked out.",
        }));
    }

    let now = controller.now();
    let duration = (now - record.in_time).num_seconds();

    let result = sqlx::query(
        "UPDATE attendance SET out_time = ?, duration_seconds = ? WHERE id = ? AND out_time IS NULL",
    )
    .bind(now)
    .bind(duration)
    .bind(id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            // Lost the race with a member's own check-out scan.
            HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": "Member has already checked out.",
            }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Exit marked successfully.",
            "duration": duration,
        })),
        Err(e) => {
            error!(error = %e, record_id = id, "mark-exit update failed");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server error marking exit.",
            }))
        }
    }
}
