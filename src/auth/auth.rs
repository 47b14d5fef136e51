use actix_web::error::InternalError;
use actix_web::{FromRequest, HttpRequest, HttpResponse, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use serde_json::json;

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;

/// Identity resolved from the bearer token. Whether the member still exists
/// and is active is checked against the database by the handlers that need
/// it.
pub struct AuthMember {
    pub member_id: u64,
    pub role: Role,
}

fn unauthorized() -> actix_web::Error {
    let resp = HttpResponse::Unauthorized().json(json!({
        "success": false,
        "message": "Authentication required. Please login.",
    }));
    InternalError::from_response("unauthorized", resp).into()
}

impl FromRequest for AuthMember {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(unauthorized())),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(unauthorized())),
        };

        let role = match Role::from_name(&claims.role) {
            Some(r) => r,
            None => return ready(Err(unauthorized())),
        };

        ready(Ok(AuthMember {
            member_id: claims.member_id,
            role,
        }))
    }
}

impl AuthMember {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
