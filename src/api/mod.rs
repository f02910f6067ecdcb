pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    Router,
    routing::{get, patch, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let uploads_dir = settings.server.uploads_dir.clone();
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/auth", auth_routes(app_state.clone()))
        .nest("/user", user_routes(app_state.clone()))
        .nest("/payment", payment_routes(app_state.clone()))
        .nest("/admin", admin_routes(app_state.clone()))
        .merge(submission_routes(app_state.clone()))

        .nest_service("/uploads", ServeDir::new(uploads_dir))

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/signup", post(handlers::signup::signup))
        .route("/verify-otp", post(handlers::signup::verify_otp))
        // Session lookup requires a live session
        .merge(Router::new()
            .route("/session", get(handlers::auth::session))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::auth::require_auth,
            ))
        )
}

fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/application/save-section",
            get(handlers::application::load).post(handlers::application::save_section),
        )
        .route("/application/progress", get(handlers::application::progress))
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn submission_routes(state: AppState) -> Router<AppState> {
    let upload_limit = state.settings.server.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/register", post(handlers::register::register))
        .route(
            "/upload",
            post(handlers::uploads::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public: the gateway signature is the credential
        .route("/verify", post(handlers::payments::verify))
        .merge(Router::new()
            .route("/failed", post(handlers::payments::failed))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::auth::require_auth,
            ))
        )
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::admin::stats))
        .route("/applications", get(handlers::admin::list_applications))
        .route("/applications/:id", patch(handlers::admin::update_application))
        .route("/users", get(handlers::admin::list_users))
        .route(
            "/users/:id",
            patch(handlers::admin::update_user).delete(handlers::admin::delete_user),
        )
        .route("/payments", get(handlers::admin::list_payments))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
