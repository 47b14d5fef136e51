use crate::{
    api::{attendance, member},
    auth::handlers,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let scan_limiter = Arc::new(build_limiter(config.rate_scan_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/admin-login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::admin_login)),
            )
            .service(
                // Kiosk scan: carries credentials itself, no bearer token yet
                web::resource("/attendance/qr-scan")
                    .wrap(scan_limiter.clone())
                    .route(web::post().to(attendance::qr_scan)),
            ),
    );

    // Protected routes; the AuthMember extractor resolves the bearer token
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("/scan")
                            .wrap(scan_limiter.clone())
                            .route(web::post().to(attendance::scan)),
                    )
                    .service(
                        web::resource("/my-attendance")
                            .route(web::get().to(attendance::my_attendance)),
                    )
                    .service(web::resource("/all").route(web::get().to(attendance::all_attendance)))
                    .service(web::resource("/stats").route(web::get().to(attendance::stats)))
                    .service(
                        web::resource("/mark-exit/{id}")
                            .route(web::put().to(attendance::mark_exit)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .service(web::resource("/members").route(web::get().to(member::list_members))),
            ),
    );
}
