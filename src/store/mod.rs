//! Persistence layer.
//!
//! Handlers talk to storage only through the [`Store`] trait. Every method
//! returns fully materialised rows; joins that a page needs are exposed as
//! their own methods instead of being assembled lazily by callers.
//!
//! Two implementations exist:
//! - [`PgStore`]: PostgreSQL through sqlx, used by the server binary
//! - [`MemoryStore`]: process-local maps, used by tests and database-less runs

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Booking, BookingConfirmation, BookingHistoryRow, Comment, CommentView, Event, EventDraft,
    EventStatus, NewBooking, NewComment, NewUser, Session, TicketDraft, TicketType, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique column already holds the value; carries a human label.
    #[error("{0} already in use")]
    Duplicate(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("quota exceeded, {remaining} remaining")]
    QuotaExceeded { remaining: i64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// True when either the username or the (lower-cased) email is taken.
    async fn user_exists(&self, username: &str, email: &str) -> StoreResult<bool>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    // Sessions
    async fn insert_session(&self, session: &Session) -> StoreResult<()>;
    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>>;
    async fn delete_session(&self, id: Uuid) -> StoreResult<()>;

    // Events
    /// All events ordered by date, optionally restricted to one genre.
    async fn list_events(&self, genre: Option<&str>) -> StoreResult<Vec<Event>>;
    /// Distinct genres present in the catalog, sorted.
    async fn list_genres(&self) -> StoreResult<Vec<String>>;
    /// Case-insensitive substring search over title and description.
    async fn search_events(&self, query: &str) -> StoreResult<Vec<Event>>;
    async fn find_event(&self, id: i64) -> StoreResult<Option<Event>>;
    async fn set_event_status(&self, id: i64, status: EventStatus) -> StoreResult<()>;
    /// Inserts the event and its ticket types atomically.
    async fn create_event(
        &self,
        draft: EventDraft,
        default_image: &str,
        created_by: Option<i64>,
        tickets: Vec<TicketDraft>,
    ) -> StoreResult<Event>;
    /// Overwrites the event and replaces all of its ticket types atomically.
    async fn update_event(
        &self,
        id: i64,
        draft: EventDraft,
        tickets: Vec<TicketDraft>,
    ) -> StoreResult<Event>;

    // Ticket types
    async fn ticket_types_for_event(&self, event_id: i64) -> StoreResult<Vec<TicketType>>;
    async fn find_ticket_type(&self, id: i64) -> StoreResult<Option<TicketType>>;

    // Comments
    /// Comments of one event, newest first.
    async fn comments_for_event(&self, event_id: i64) -> StoreResult<Vec<CommentView>>;
    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;

    // Bookings
    /// Inserts a booking unless it would exceed the ticket type's quota.
    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking>;
    async fn booking_confirmation(&self, id: i64) -> StoreResult<Option<BookingConfirmation>>;
    /// Bookings of one user joined with ticket type and event, newest first.
    async fn booking_history(&self, user_id: i64) -> StoreResult<Vec<BookingHistoryRow>>;
}

/// Tickets still sellable for a type given what has been booked already.
pub fn remaining_quota(quota: Option<i32>, booked: i64) -> Option<i64> {
    quota.map(|q| (i64::from(q) - booked).max(0))
}

/// Applies the lazy status rule and persists the change if one is due.
pub async fn refresh_event_status(
    store: &dyn Store,
    event: &mut Event,
    today: NaiveDate,
) -> StoreResult<()> {
    if let Some(status) = event.derived_status(today) {
        store.set_event_status(event.id, status).await?;
        tracing::info!(
            event_id = event.id,
            from = %event.status,
            to = %status,
            "Event status updated after its date passed"
        );
        event.status = status;
    }
    Ok(())
}
