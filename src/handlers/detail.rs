use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Local;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::auth::{CurrentUser, MaybeUser};
use crate::forms::detail::{COMMENT_MAX_CHARS, MAX_TICKETS_PER_BOOKING, MIN_TICKETS_PER_BOOKING};
use crate::forms::{DetailAction, DetailForm};
use crate::models::{CommentView, Event, EventStatus, NewBooking, NewComment, TicketType};
use crate::state::AppState;
use crate::store::refresh_event_status;
use crate::utils::error::AppError;
use crate::utils::response::view;

#[derive(Serialize)]
struct TicketChoice {
    id: i64,
    label: String,
    price: Decimal,
    display: String,
}

impl From<TicketType> for TicketChoice {
    fn from(ticket: TicketType) -> Self {
        Self {
            display: ticket.choice_label(),
            id: ticket.id,
            label: ticket.label,
            price: ticket.price,
        }
    }
}

#[derive(Serialize)]
struct FormLimits {
    comment_max_chars: usize,
    min_tickets: i32,
    max_tickets: i32,
}

#[derive(Serialize)]
struct EventDetailView {
    event: Event,
    ticket_types: Vec<TicketChoice>,
    comments: Vec<CommentView>,
    can_book: bool,
    can_edit: bool,
    limits: FormLimits,
}

async fn load_current_event(state: &AppState, id: i64) -> Result<Event, AppError> {
    let mut event = state
        .store
        .find_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {id} was not found")))?;
    refresh_event_status(state.store.as_ref(), &mut event, Local::now().date_naive()).await?;
    Ok(event)
}

pub async fn event_detail(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let event = load_current_event(&state, id).await?;
    let ticket_types = state.store.ticket_types_for_event(id).await?;
    let comments = state.store.comments_for_event(id).await?;

    let can_edit = match (&current, event.created_by) {
        (Some(user), Some(owner)) => user.id() == owner,
        (Some(_), None) => true,
        (None, _) => false,
    };

    Ok(view(EventDetailView {
        can_book: event.status == EventStatus::Open && !ticket_types.is_empty(),
        can_edit,
        event,
        ticket_types: ticket_types.into_iter().map(TicketChoice::from).collect(),
        comments,
        limits: FormLimits {
            comment_max_chars: COMMENT_MAX_CHARS,
            min_tickets: MIN_TICKETS_PER_BOOKING,
            max_tickets: MAX_TICKETS_PER_BOOKING,
        },
    }))
}

/// Handles both forms of the detail page: posting a comment and booking
/// tickets.
pub async fn event_detail_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<DetailForm>,
) -> Result<Response, AppError> {
    let event = load_current_event(&state, id).await?;

    match form.validate().map_err(AppError::Validation)? {
        DetailAction::Comment { content } => {
            let comment = state
                .store
                .insert_comment(NewComment {
                    user_id: current.id(),
                    event_id: event.id,
                    content,
                })
                .await?;
            info!(
                comment_id = comment.id,
                event_id = event.id,
                user_id = current.id(),
                "Comment posted"
            );
            Ok(Redirect::to(&format!("/event/{}", event.id)).into_response())
        }
        DetailAction::Booking {
            ticket_type_id,
            quantity,
        } => {
            let ticket = state
                .store
                .find_ticket_type(ticket_type_id)
                .await?
                .filter(|t| t.event_id == event.id)
                .ok_or_else(|| {
                    AppError::field("ticket_type", "Choose a ticket type offered for this event")
                })?;

            if event.status != EventStatus::Open {
                return Err(AppError::Conflict(format!(
                    "Bookings are closed for this event ({})",
                    event.status
                )));
            }

            let booking = state
                .store
                .insert_booking(NewBooking {
                    user_id: current.id(),
                    ticket_type_id: ticket.id,
                    quantity,
                })
                .await?;
            info!(
                booking_id = booking.id,
                event_id = event.id,
                ticket_type_id = ticket.id,
                quantity,
                user_id = current.id(),
                "Tickets booked"
            );
            Ok(Redirect::to(&format!("/booking/{}/confirmation", booking.id)).into_response())
        }
    }
}
