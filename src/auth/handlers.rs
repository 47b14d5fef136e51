use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::{
    auth::{
        jwt::generate_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    model::{member::Member, role::Role},
    models::{LoginReq, RegisterReq},
};

pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty() && !host.is_empty() && !tld.is_empty()
}

fn validation_failed(errors: Vec<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "message": "Validation failed",
        "errors": errors,
    }))
}

fn server_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "message": message,
    }))
}

fn validate_registration(req: &RegisterReq) -> Vec<String> {
    let mut errors = Vec::new();
    if req.name.trim().len() < 2 {
        errors.push("Name must be at least 2 characters long".to_string());
    }
    if !is_valid_phone(req.phone.trim()) {
        errors.push("Phone number must be 10 digits".to_string());
    }
    if req.password.len() < 6 {
        errors.push("Password must be at least 6 characters long".to_string());
    }
    if let Some(email) = req.email.as_deref() {
        if !email.trim().is_empty() && !is_valid_email(email.trim()) {
            errors.push("Please enter a valid email".to_string());
        }
    }
    errors
}

/// Member registration
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Member registered", body = Object, example = json!({
            "success": true,
            "message": "Registration successful! Welcome to Muscle Art Fitness."
        })),
        (status = 400, description = "Validation failure or phone already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn register(
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let errors = validate_registration(&req);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let name = req.name.trim();
    let phone = req.phone.trim();
    let email = req.email.as_deref().map(str::trim).unwrap_or("");
    let hashed = hash_password(&req.password);

    let result = sqlx::query(
        "INSERT INTO members (name, phone, email, password, role) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(phone)
    .bind(email)
    .bind(&hashed)
    .bind(Role::Member.name())
    .execute(pool.get_ref())
    .await;

    let member_id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) => {
            // Duplicate phone hits the unique key
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return HttpResponse::BadRequest().json(json!({
                        "success": false,
                        "message": "Phone number already registered.",
                    }));
                }
            }
            error!(error = %e, "registration insert failed");
            return server_error("Server error during registration. Please try again.");
        }
    };

    let member = match Member::find_by_id(pool.get_ref(), member_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            error!(member_id, "member vanished right after insert");
            return server_error("Server error during registration. Please try again.");
        }
        Err(e) => {
            error!(error = %e, "failed to load new member");
            return server_error("Server error during registration. Please try again.");
        }
    };

    info!(member_id, "member registered");

    let token = generate_token(member.id, &member.role, &config.jwt_secret, config.token_ttl);

    HttpResponse::Created().json(json!({
        "success": true,
        "message": "Registration successful! Welcome to Muscle Art Fitness.",
        "user": member.public_json(),
        "token": token,
    }))
}

/// Member login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Login successful"),
        (status = 400, description = "Validation failure or invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(req, pool, config), fields(phone = %req.phone))]
pub async fn login(
    req: web::Json<LoginReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    let mut errors = Vec::new();
    if !is_valid_phone(req.phone.trim()) {
        errors.push("Phone number must be 10 digits".to_string());
    }
    if req.password.is_empty() {
        errors.push("Password is required".to_string());
    }
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let member = match Member::find_active_by_phone(pool.get_ref(), req.phone.trim()).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            info!("Invalid credentials: member not found");
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": "Invalid phone number or password.",
            }));
        }
        Err(e) => {
            error!(error = %e, "database error while fetching member");
            return server_error("Server error during login. Please try again.");
        }
    };

    if !verify_password(&req.password, &member.password) {
        info!("Invalid credentials: password mismatch");
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "Invalid phone number or password.",
        }));
    }

    debug!(member_id = member.id, "password verified");

    let token = generate_token(member.id, &member.role, &config.jwt_secret, config.token_ttl);

    info!("Login successful");

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful. Welcome back!",
        "user": member.public_json(),
        "token": token,
    }))
}

/// Admin login
#[utoipa::path(
    post,
    path = "/auth/admin-login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Admin login successful"),
        (status = 400, description = "Validation failure or invalid admin credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn admin_login(
    req: web::Json<LoginReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let mut errors = Vec::new();
    if !is_valid_phone(req.phone.trim()) {
        errors.push("Phone number must be 10 digits".to_string());
    }
    if req.password.is_empty() {
        errors.push("Password is required".to_string());
    }
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let member = match Member::find_admin_by_phone(pool.get_ref(), req.phone.trim()).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": "Invalid admin credentials.",
            }));
        }
        Err(e) => {
            error!(error = %e, "database error while fetching admin");
            return server_error("Server error during admin login.");
        }
    };

    if !verify_password(&req.password, &member.password) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "Invalid admin credentials.",
        }));
    }

    let token = generate_token(member.id, &member.role, &config.jwt_secret, config.token_ttl);

    info!(member_id = member.id, "admin login successful");

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Admin login successful.",
        "user": member.public_json(),
        "token": token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("987654321"));
        assert!(!is_valid_phone("98765432100"));
        assert!(!is_valid_phone("987654321x"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jo@gym.example"));
        assert!(!is_valid_email("jo@gym"));
        assert!(!is_valid_email("@gym.example"));
        assert!(!is_valid_email("jo-gym.example"));
    }
}
