use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{remaining_quota, Store, StoreError, StoreResult};
use crate::models::{
    Booking, BookingConfirmation, BookingHistoryRow, Comment, CommentView, Event, EventDraft,
    EventStatus, NewBooking, NewComment, NewUser, Session, TicketDraft, TicketType, User,
};

/// In-memory [`Store`].
///
/// Every write takes the single lock, so multi-row operations are atomic the
/// same way a database transaction would make them.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    sessions: HashMap<Uuid, Session>,
    events: BTreeMap<i64, Event>,
    ticket_types: BTreeMap<i64, TicketType>,
    bookings: BTreeMap<i64, Booking>,
    comments: BTreeMap<i64, Comment>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_ticket_types(&mut self, event_id: i64, tickets: Vec<TicketDraft>) {
        for ticket in tickets {
            let id = self.allocate_id();
            self.ticket_types.insert(
                id,
                TicketType {
                    id,
                    event_id,
                    label: ticket.label,
                    price: ticket.price,
                    quota: ticket.quota,
                },
            );
        }
    }

    fn booked_quantity(&self, ticket_type_id: i64) -> i64 {
        self.bookings
            .values()
            .filter(|b| b.ticket_type_id == Some(ticket_type_id))
            .map(|b| i64::from(b.quantity))
            .sum()
    }

    /// Booking joined with its ticket type and event; `None` once the ticket
    /// type has been replaced.
    fn booking_join(&self, booking: &Booking) -> Option<(&TicketType, &Event)> {
        let ticket = self.ticket_types.get(&booking.ticket_type_id?)?;
        let event = self.events.get(&ticket.event_id)?;
        Some((ticket, event))
    }
}

fn sort_by_schedule(events: &mut [Event]) {
    events.sort_by(|a, b| {
        (a.event_date, a.start_time, a.id).cmp(&(b.event_date, b.start_time, b.id))
    });
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bookings held, regardless of owner.
    pub async fn booking_count(&self) -> usize {
        self.inner.read().await.bookings.len()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_exists(&self, username: &str, email: &str) -> StoreResult<bool> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.inner.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Duplicate("Username or email".to_string()));
        }

        let id = tables.allocate_id();
        let user = User {
            id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            phone: user.phone,
            address: user.address,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let mut tables = self.inner.write().await;
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<()> {
        self.inner.write().await.sessions.remove(&id);
        Ok(())
    }

    async fn list_events(&self, genre: Option<&str>) -> StoreResult<Vec<Event>> {
        let tables = self.inner.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| genre.map_or(true, |g| e.genre == g))
            .cloned()
            .collect();
        sort_by_schedule(&mut events);
        Ok(events)
    }

    async fn list_genres(&self) -> StoreResult<Vec<String>> {
        let tables = self.inner.read().await;
        let genres: BTreeSet<String> = tables.events.values().map(|e| e.genre.clone()).collect();
        Ok(genres.into_iter().collect())
    }

    async fn search_events(&self, query: &str) -> StoreResult<Vec<Event>> {
        let needle = query.to_lowercase();
        let tables = self.inner.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| e.matches_query(&needle))
            .cloned()
            .collect();
        sort_by_schedule(&mut events);
        Ok(events)
    }

    async fn find_event(&self, id: i64) -> StoreResult<Option<Event>> {
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    async fn set_event_status(&self, id: i64, status: EventStatus) -> StoreResult<()> {
        if let Some(event) = self.inner.write().await.events.get_mut(&id) {
            event.status = status;
        }
        Ok(())
    }

    async fn create_event(
        &self,
        draft: EventDraft,
        default_image: &str,
        created_by: Option<i64>,
        tickets: Vec<TicketDraft>,
    ) -> StoreResult<Event> {
        let mut tables = self.inner.write().await;
        let id = tables.allocate_id();
        let event = Event {
            id,
            title: draft.title,
            description: draft.description,
            genre: draft.genre,
            location: draft.location,
            event_date: draft.event_date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            image: draft.image.unwrap_or_else(|| default_image.to_string()),
            status: draft.status.unwrap_or(EventStatus::Open),
            created_by,
            created_at: Utc::now(),
        };
        tables.events.insert(id, event.clone());
        tables.insert_ticket_types(id, tickets);
        Ok(event)
    }

    async fn update_event(
        &self,
        id: i64,
        draft: EventDraft,
        tickets: Vec<TicketDraft>,
    ) -> StoreResult<Event> {
        let mut tables = self.inner.write().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;

        event.title = draft.title;
        event.description = draft.description;
        event.genre = draft.genre;
        event.location = draft.location;
        event.event_date = draft.event_date;
        event.start_time = draft.start_time;
        event.end_time = draft.end_time;
        if let Some(image) = draft.image {
            event.image = image;
        }
        if let Some(status) = draft.status {
            event.status = status;
        }
        let updated = event.clone();

        let replaced: Vec<i64> = tables
            .ticket_types
            .values()
            .filter(|t| t.event_id == id)
            .map(|t| t.id)
            .collect();
        for ticket_id in &replaced {
            tables.ticket_types.remove(ticket_id);
        }
        for booking in tables.bookings.values_mut() {
            if booking
                .ticket_type_id
                .is_some_and(|t| replaced.contains(&t))
            {
                booking.ticket_type_id = None;
            }
        }
        tables.insert_ticket_types(id, tickets);

        Ok(updated)
    }

    async fn ticket_types_for_event(&self, event_id: i64) -> StoreResult<Vec<TicketType>> {
        let tables = self.inner.read().await;
        Ok(tables
            .ticket_types
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn find_ticket_type(&self, id: i64) -> StoreResult<Option<TicketType>> {
        Ok(self.inner.read().await.ticket_types.get(&id).cloned())
    }

    async fn comments_for_event(&self, event_id: i64) -> StoreResult<Vec<CommentView>> {
        let tables = self.inner.read().await;
        let mut comments: Vec<CommentView> = tables
            .comments
            .values()
            .filter(|c| c.event_id == event_id)
            .filter_map(|c| {
                let author = tables.users.get(&c.user_id)?;
                Some(CommentView {
                    id: c.id,
                    content: c.content.clone(),
                    posted_at: c.posted_at,
                    author_id: author.id,
                    author_name: author.full_name(),
                })
            })
            .collect();
        comments.sort_by(|a, b| (b.posted_at, b.id).cmp(&(a.posted_at, a.id)));
        Ok(comments)
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.inner.write().await;
        let id = tables.allocate_id();
        let comment = Comment {
            id,
            content: comment.content,
            user_id: comment.user_id,
            event_id: comment.event_id,
            posted_at: Utc::now(),
        };
        tables.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        let mut tables = self.inner.write().await;
        let quota = tables
            .ticket_types
            .get(&booking.ticket_type_id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket type {}", booking.ticket_type_id)))?
            .quota;

        let booked = tables.booked_quantity(booking.ticket_type_id);
        if let Some(remaining) = remaining_quota(quota, booked) {
            if i64::from(booking.quantity) > remaining {
                return Err(StoreError::QuotaExceeded { remaining });
            }
        }

        let id = tables.allocate_id();
        let created = Booking {
            id,
            user_id: booking.user_id,
            ticket_type_id: Some(booking.ticket_type_id),
            quantity: booking.quantity,
            booked_at: Utc::now(),
        };
        tables.bookings.insert(id, created.clone());
        Ok(created)
    }

    async fn booking_confirmation(&self, id: i64) -> StoreResult<Option<BookingConfirmation>> {
        let tables = self.inner.read().await;
        let Some(booking) = tables.bookings.get(&id) else {
            return Ok(None);
        };
        let Some((ticket, event)) = tables.booking_join(booking) else {
            return Ok(None);
        };
        let Some(user) = tables.users.get(&booking.user_id) else {
            return Ok(None);
        };

        Ok(Some(BookingConfirmation {
            booking_id: booking.id,
            user_id: booking.user_id,
            quantity: booking.quantity,
            booked_at: booking.booked_at,
            ticket_label: ticket.label.clone(),
            unit_price: ticket.price,
            event_id: event.id,
            event_title: event.title.clone(),
            event_date: event.event_date,
            user_first_name: user.first_name.clone(),
            user_last_name: user.last_name.clone(),
            user_email: user.email.clone(),
        }))
    }

    async fn booking_history(&self, user_id: i64) -> StoreResult<Vec<BookingHistoryRow>> {
        let tables = self.inner.read().await;
        let mut rows: Vec<BookingHistoryRow> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .filter_map(|b| {
                let (ticket, event) = tables.booking_join(b)?;
                Some(BookingHistoryRow {
                    booking_id: b.id,
                    quantity: b.quantity,
                    booked_at: b.booked_at,
                    ticket_label: ticket.label.clone(),
                    unit_price: ticket.price,
                    event_id: event.id,
                    event_title: event.title.clone(),
                    event_date: event.event_date,
                })
            })
            .collect();
        rows.sort_by(|a, b| (b.booked_at, b.booking_id).cmp(&(a.booked_at, a.booking_id)));
        Ok(rows)
    }
}
