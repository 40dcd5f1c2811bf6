use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS configuration for the single-page client
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Auth endpoints (mixed: some public, some protected)
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        // Content browsing (public)
        .nest("/api/v1/content", content_routes())
        // Per-user collections (require JWT)
        .nest("/api/v1/user", user_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Code-issuing routes share the OTP rate limit (each request sends an email)
    let otp_issuing_routes = Router::new()
        .route("/register-otp", post(handlers::auth::register_otp))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::otp_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let verify_routes = Router::new()
        .route(
            "/verify-register-otp",
            post(handlers::auth::verify_register_otp),
        )
        .route("/verify-otp", post(handlers::auth::verify_reset_otp))
        .route("/reset-password", post(handlers::auth::reset_password));

    let public_routes = otp_issuing_routes.merge(login_route).merge(verify_routes);

    // Protected routes (require JWT auth)
    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn content_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/", get(handlers::content::get_content))
}

fn user_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/bookmarks",
            get(handlers::user::list_bookmarks).post(handlers::user::toggle_bookmark),
        )
        .route(
            "/progress",
            get(handlers::user::list_progress).post(handlers::user::toggle_progress),
        )
        .route("/profile", patch(handlers::user::update_profile))
        .route("/password", post(handlers::user::change_password))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}
