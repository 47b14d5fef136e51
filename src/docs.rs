use crate::models::{LoginReq, QrScanReq, RegisterReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gym Attendance Portal API",
        version = "1.0.0",
        description = r#"
## Gym Attendance Portal

Membership registration/login and the QR-triggered check-in/check-out flow.

### 🔹 Key Features
- **Members**
  - Register with phone + password, login, admin login
- **Attendance**
  - One scan endpoint that decides check-in vs check-out
  - 4-hour active-session window, 30-minute cooldown, 2 sessions per day
- **Admin**
  - Attendance listing and daily stats, member directory, manual exit marking

### 🔐 Security
Protected endpoints use **JWT Bearer authentication**. Admin endpoints
require an admin role token.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::admin_login,

        crate::api::attendance::scan,
        crate::api::attendance::qr_scan,
        crate::api::attendance::my_attendance,
        crate::api::attendance::all_attendance,
        crate::api::attendance::stats,
        crate::api::attendance::mark_exit,

        crate::api::member::list_members,
    ),
    components(schemas(RegisterReq, LoginReq, QrScanReq)),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Attendance", description = "Check-in/check-out scans and history"),
        (name = "Admin", description = "Admin-only member management")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
