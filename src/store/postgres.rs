use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use uuid::Uuid;

use super::{remaining_quota, Store, StoreError, StoreResult};
use crate::models::{
    Booking, BookingConfirmation, BookingHistoryRow, Comment, CommentView, Event, EventDraft,
    EventStatus, NewBooking, NewComment, NewUser, Session, TicketDraft, TicketType, User,
};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, password_hash, \
                            phone, address, created_at";

const EVENT_COLUMNS: &str = "id, title, description, genre, location, event_date, start_time, \
                             end_time, image, status, created_by, created_at";

const BOOKING_JOIN: &str = "FROM bookings b \
                            JOIN ticket_types t ON t.id = b.ticket_type_id \
                            JOIN events e ON e.id = t.event_id";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a unique-constraint violation to [`StoreError::Duplicate`].
fn duplicate_as(what: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(what.to_string())
        }
        _ => StoreError::Database(err),
    }
}

/// Escapes LIKE metacharacters so user input only ever matches literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn insert_ticket_types(
    conn: &mut PgConnection,
    event_id: i64,
    tickets: &[TicketDraft],
) -> Result<(), sqlx::Error> {
    for ticket in tickets {
        sqlx::query(
            "INSERT INTO ticket_types (event_id, label, price, quota) VALUES ($1, $2, $3, $4)",
        )
        .bind(event_id)
        .bind(&ticket.label)
        .bind(ticket.price)
        .bind(ticket.quota)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_exists(&self, username: &str, email: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, first_name, last_name, email, password_hash, phone, address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.address)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_as("Username or email"))
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_events(&self, genre: Option<&str>) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE ($1::TEXT IS NULL OR genre = $1) \
             ORDER BY event_date, start_time, id"
        ))
        .bind(genre)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn list_genres(&self) -> StoreResult<Vec<String>> {
        let genres = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT genre FROM events ORDER BY genre",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn search_events(&self, query: &str) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE title ILIKE $1 ESCAPE '\\' OR description ILIKE $1 ESCAPE '\\' \
             ORDER BY event_date, start_time, id"
        ))
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn find_event(&self, id: i64) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn set_event_status(&self, id: i64, status: EventStatus) -> StoreResult<()> {
        sqlx::query("UPDATE events SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_event(
        &self,
        draft: EventDraft,
        default_image: &str,
        created_by: Option<i64>,
        tickets: Vec<TicketDraft>,
    ) -> StoreResult<Event> {
        let mut tx = self.pool.begin().await?;

        let status = draft.status.unwrap_or(EventStatus::Open);
        let image = draft.image.as_deref().unwrap_or(default_image);
        let event = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events \
             (title, description, genre, location, event_date, start_time, end_time, image, status, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {EVENT_COLUMNS}"
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.genre)
        .bind(&draft.location)
        .bind(draft.event_date)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(image)
        .bind(status.as_str())
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_ticket_types(&mut *tx, event.id, &tickets).await?;
        tx.commit().await?;

        Ok(event)
    }

    async fn update_event(
        &self,
        id: i64,
        draft: EventDraft,
        tickets: Vec<TicketDraft>,
    ) -> StoreResult<Event> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET title = $2, description = $3, genre = $4, location = $5, \
             event_date = $6, start_time = $7, end_time = $8, \
             image = COALESCE($9, image), status = COALESCE($10, status) \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.genre)
        .bind(&draft.location)
        .bind(draft.event_date)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(&draft.image)
        .bind(draft.status.map(|s| s.as_str()))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;

        sqlx::query("DELETE FROM ticket_types WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_ticket_types(&mut *tx, id, &tickets).await?;
        tx.commit().await?;

        Ok(event)
    }

    async fn ticket_types_for_event(&self, event_id: i64) -> StoreResult<Vec<TicketType>> {
        let tickets = sqlx::query_as::<_, TicketType>(
            "SELECT id, event_id, label, price, quota FROM ticket_types \
             WHERE event_id = $1 ORDER BY id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn find_ticket_type(&self, id: i64) -> StoreResult<Option<TicketType>> {
        let ticket = sqlx::query_as::<_, TicketType>(
            "SELECT id, event_id, label, price, quota FROM ticket_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn comments_for_event(&self, event_id: i64) -> StoreResult<Vec<CommentView>> {
        let comments = sqlx::query_as::<_, CommentView>(
            "SELECT c.id, c.content, c.posted_at, c.user_id AS author_id, \
             u.first_name || ' ' || u.last_name AS author_name \
             FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.event_id = $1 ORDER BY c.posted_at DESC, c.id DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (content, user_id, event_id) VALUES ($1, $2, $3) \
             RETURNING id, content, user_id, event_id, posted_at",
        )
        .bind(&comment.content)
        .bind(comment.user_id)
        .bind(comment.event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent bookings of the same ticket type.
        let quota = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT quota FROM ticket_types WHERE id = $1 FOR UPDATE",
        )
        .bind(booking.ticket_type_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("ticket type {}", booking.ticket_type_id)))?;

        if quota.is_some() {
            let booked: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM bookings WHERE ticket_type_id = $1",
            )
            .bind(booking.ticket_type_id)
            .fetch_one(&mut *tx)
            .await?;

            if let Some(remaining) = remaining_quota(quota, booked) {
                if i64::from(booking.quantity) > remaining {
                    return Err(StoreError::QuotaExceeded { remaining });
                }
            }
        }

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (user_id, ticket_type_id, quantity) VALUES ($1, $2, $3) \
             RETURNING id, user_id, ticket_type_id, quantity, booked_at",
        )
        .bind(booking.user_id)
        .bind(booking.ticket_type_id)
        .bind(booking.quantity)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn booking_confirmation(&self, id: i64) -> StoreResult<Option<BookingConfirmation>> {
        let confirmation = sqlx::query_as::<_, BookingConfirmation>(&format!(
            "SELECT b.id AS booking_id, b.user_id, b.quantity, b.booked_at, \
             t.label AS ticket_label, t.price AS unit_price, \
             e.id AS event_id, e.title AS event_title, e.event_date, \
             u.first_name AS user_first_name, u.last_name AS user_last_name, u.email AS user_email \
             {BOOKING_JOIN} JOIN users u ON u.id = b.user_id \
             WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(confirmation)
    }

    async fn booking_history(&self, user_id: i64) -> StoreResult<Vec<BookingHistoryRow>> {
        let rows = sqlx::query_as::<_, BookingHistoryRow>(&format!(
            "SELECT b.id AS booking_id, b.quantity, b.booked_at, \
             t.label AS ticket_label, t.price AS unit_price, \
             e.id AS event_id, e.title AS event_title, e.event_date \
             {BOOKING_JOIN} \
             WHERE b.user_id = $1 ORDER BY b.booked_at DESC, b.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
