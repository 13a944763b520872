use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Local;
use serde::Serialize;
use tracing::info;

use crate::auth::CurrentUser;
use crate::forms::EventForm;
use crate::models::{Event, EventStatus, TicketType, GENRES};
use crate::state::AppState;
use crate::store::{refresh_event_status, StoreResult};
use crate::utils::error::AppError;
use crate::utils::response::view;
use crate::utils::upload::{discard_image, store_image};

#[derive(Serialize)]
struct EventFormView {
    genres: &'static [&'static str],
    statuses: Vec<&'static str>,
    event: Option<Event>,
    ticket_types: Vec<TicketType>,
}

fn status_choices() -> Vec<&'static str> {
    EventStatus::ALL.iter().map(EventStatus::as_str).collect()
}

/// Events without a recorded creator may be edited by any signed-in user.
fn ensure_can_edit(event: &Event, current: &CurrentUser) -> Result<(), AppError> {
    match event.created_by {
        Some(owner) if owner != current.id() => Err(AppError::Forbidden(
            "Only the event's creator can edit it".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn load_event(state: &AppState, id: i64) -> Result<Event, AppError> {
    state
        .store
        .find_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {id} was not found")))
}

async fn store_upload(state: &AppState, form: &EventForm) -> Result<Option<String>, AppError> {
    match &form.image {
        Some(upload) => Ok(Some(store_image(&state.config.upload_dir, upload).await?)),
        None => Ok(None),
    }
}

/// Deletes a just-stored upload when the event write failed.
async fn keep_image_if_ok(
    state: &AppState,
    stored_image: Option<String>,
    result: StoreResult<Event>,
) -> Result<Event, AppError> {
    if result.is_err() {
        if let Some(file_name) = stored_image {
            discard_image(&state.config.upload_dir, &file_name).await;
        }
    }
    Ok(result?)
}

pub async fn create_event_page(_current: CurrentUser) -> Response {
    view(EventFormView {
        genres: &GENRES,
        statuses: Vec::new(),
        event: None,
        ticket_types: Vec::new(),
    })
}

pub async fn create_event(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = EventForm::from_multipart(multipart).await?;
    let (mut draft, tickets) = form.validate(false).map_err(AppError::Validation)?;

    draft.image = store_upload(&state, &form).await?;
    let stored_image = draft.image.clone();

    let ticket_count = tickets.len();
    let created = state
        .store
        .create_event(draft, &state.config.default_image, Some(current.id()), tickets)
        .await;
    let event = keep_image_if_ok(&state, stored_image, created).await?;

    info!(
        event_id = event.id,
        user_id = current.id(),
        ticket_types = ticket_count,
        "Event created"
    );

    Ok(Redirect::to(&format!("/event/{}", event.id)).into_response())
}

pub async fn edit_event_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let mut event = load_event(&state, id).await?;
    ensure_can_edit(&event, &current)?;
    refresh_event_status(state.store.as_ref(), &mut event, Local::now().date_naive()).await?;
    let ticket_types = state.store.ticket_types_for_event(id).await?;

    Ok(view(EventFormView {
        genres: &GENRES,
        statuses: status_choices(),
        event: Some(event),
        ticket_types,
    }))
}

/// Overwrites the event and replaces its ticket types wholesale.
pub async fn edit_event(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let event = load_event(&state, id).await?;
    ensure_can_edit(&event, &current)?;

    let form = EventForm::from_multipart(multipart).await?;
    let (mut draft, tickets) = form.validate(true).map_err(AppError::Validation)?;

    draft.image = store_upload(&state, &form).await?;
    let stored_image = draft.image.clone();

    let ticket_count = tickets.len();
    let updated = state.store.update_event(id, draft, tickets).await;
    let event = keep_image_if_ok(&state, stored_image, updated).await?;

    info!(
        event_id = event.id,
        user_id = current.id(),
        status = %event.status,
        ticket_types = ticket_count,
        "Event updated, ticket types replaced"
    );

    Ok(Redirect::to(&format!("/event/{}", event.id)).into_response())
}
