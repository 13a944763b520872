use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod auth;
pub mod authoring;
pub mod bookings;
pub mod catalog;
pub mod detail;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventhub",
    };

    success(payload, "Health check successful")
}
