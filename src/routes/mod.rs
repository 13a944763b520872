use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{auth, authoring, bookings, catalog, detail, health_check};
use crate::state::AppState;
use crate::utils::response::{internal_error_page, not_found_page};

pub fn create_routes(state: AppState) -> Router {
    let upload_dir = state.config.upload_dir.clone();
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/", get(catalog::list_events))
        .route("/search", get(catalog::search_events))
        .route(
            "/event/:id",
            get(detail::event_detail).post(detail::event_detail_submit),
        )
        .route(
            "/booking/:id/confirmation",
            get(bookings::booking_confirmation),
        )
        .route("/bookinghistory", get(bookings::booking_history))
        .route(
            "/CreateEvent",
            get(authoring::create_event_page).post(authoring::create_event),
        )
        .route(
            "/EditEvent/:id",
            get(authoring::edit_event_page).post(authoring::edit_event),
        )
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(upload_dir))
        .fallback(not_found_page)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(internal_error_page))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
