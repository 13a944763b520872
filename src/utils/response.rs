use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Envelope for every successful JSON view.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
}

/// Renders a page's data without a flash message.
pub fn view<T>(data: T) -> Response
where
    T: Serialize,
{
    let body = ApiResponse {
        success: true,
        data: Some(data),
        message: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn success<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    let body = ApiResponse {
        success: true,
        data: Some(data),
        message: Some(message.into()),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
    status: StatusCode,
) -> Response {
    let body = ApiErrorResponse {
        success: false,
        error: ApiErrorBody {
            code: code.to_string(),
            message: message.into(),
            details,
        },
    };

    (status, Json(body)).into_response()
}

/// Fallback for unmatched routes.
pub async fn not_found_page() -> Response {
    error(
        "NOT_FOUND",
        "The requested page does not exist",
        None,
        StatusCode::NOT_FOUND,
    )
}

/// Converts a handler panic into the generic 500 page.
pub fn internal_error_page(
    _panic: Box<dyn std::any::Any + Send + 'static>,
) -> Response {
    tracing::error!("Handler panicked");
    error(
        "INTERNAL_SERVER_ERROR",
        "An internal error occurred",
        None,
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}
