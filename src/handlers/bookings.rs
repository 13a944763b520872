use axum::extract::{Path, State};
use axum::response::Response;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::models::{BookingConfirmation, BookingHistoryRow};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::view;

#[derive(Serialize)]
struct ConfirmationView {
    booker_name: String,
    total_price: Decimal,
    #[serde(flatten)]
    booking: BookingConfirmation,
}

#[derive(Serialize)]
struct HistoryView {
    bookings: Vec<BookingHistoryRow>,
}

/// Other users' bookings answer 404 so their ids are not disclosed.
pub async fn booking_confirmation(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let booking = state
        .store
        .booking_confirmation(id)
        .await?
        .filter(|b| b.user_id == current.id())
        .ok_or_else(|| AppError::NotFound(format!("Booking {id} was not found")))?;

    Ok(view(ConfirmationView {
        booker_name: format!("{} {}", booking.user_first_name, booking.user_last_name),
        total_price: booking.total_price(),
        booking,
    }))
}

pub async fn booking_history(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let bookings = state.store.booking_history(current.id()).await?;
    tracing::debug!(user_id = current.id(), count = bookings.len(), "Listing bookings");
    Ok(view(HistoryView { bookings }))
}
