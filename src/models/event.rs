use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Genres offered by the authoring form.
pub const GENRES: [&str; 6] = ["Hip Hop", "R&B", "Jazz", "Rap", "Electronic", "Comedy"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Open,
    Inactive,
    #[serde(rename = "Sold Out")]
    SoldOut,
    Cancelled,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::Open,
        EventStatus::Inactive,
        EventStatus::SoldOut,
        EventStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Open => "Open",
            EventStatus::Inactive => "Inactive",
            EventStatus::SoldOut => "Sold Out",
            EventStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub location: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub image: String,
    pub status: EventStatus,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Status the event should move to once `today` is known, if any.
    ///
    /// Past events become Inactive unless they were cancelled.
    pub fn derived_status(&self, today: NaiveDate) -> Option<EventStatus> {
        let expired = self.event_date < today;
        match self.status {
            EventStatus::Cancelled | EventStatus::Inactive => None,
            _ if expired => Some(EventStatus::Inactive),
            _ => None,
        }
    }

    pub fn matches_query(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

impl<'r> FromRow<'r, PgRow> for Event {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse().map_err(|e: UnknownStatus| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            genre: row.try_get("genre")?,
            location: row.try_get("location")?,
            event_date: row.try_get("event_date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            image: row.try_get("image")?,
            status,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Editable event fields, shared by create and edit.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub genre: String,
    pub location: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    /// `None` keeps the stored image on edit and selects the default on create.
    pub image: Option<String>,
    /// `None` keeps the stored status on edit and means Open on create.
    pub status: Option<EventStatus>,
}
