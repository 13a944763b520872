use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::Multipart;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use super::{optional, required, FieldErrors};
use crate::models::{EventDraft, EventStatus, TicketDraft, GENRES};
use crate::utils::error::AppError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

/// Largest price a `NUMERIC(10,2)` column holds.
fn max_ticket_price() -> Decimal {
    Decimal::new(99_999_999_99, 2)
}

/// An uploaded image file, not yet written to disk.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw multipart submission of the create/edit event form.
///
/// Ticket rows arrive as the parallel repeated fields `ticket_label[]`,
/// `ticket_price[]` and `ticket_quota[]`.
#[derive(Debug, Default)]
pub struct EventForm {
    pub title: String,
    pub genre: String,
    pub description: String,
    pub location: String,
    pub event_date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub ticket_labels: Vec<String>,
    pub ticket_prices: Vec<String>,
    pub ticket_quotas: Vec<String>,
    pub image: Option<ImageUpload>,
}

impl EventForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = EventForm::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "img" || name == "image" {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed)?;
                // Browsers send an empty part when no file was chosen.
                if let Some(file_name) = file_name.filter(|n| !n.is_empty()) {
                    if !bytes.is_empty() {
                        form.image = Some(ImageUpload { file_name, bytes });
                    }
                }
                continue;
            }

            let value = field.text().await.map_err(malformed)?;
            form.set(&name, value);
        }

        Ok(form)
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "genre" => self.genre = value,
            "description" => self.description = value,
            "location" => self.location = value,
            "event_date" => self.event_date = value,
            "start_time" => self.start_time = value,
            "end_time" => self.end_time = value,
            "status" => self.status = value,
            "ticket_label[]" | "ticket_label" => self.ticket_labels.push(value),
            "ticket_price[]" | "ticket_price" => self.ticket_prices.push(value),
            "ticket_quota[]" | "ticket_quota" => self.ticket_quotas.push(value),
            other => tracing::debug!(field = other, "Ignoring unknown event form field"),
        }
    }

    /// Checks every field. `allow_status` is set by the edit form, where the
    /// status may be chosen directly.
    pub fn validate(&self, allow_status: bool) -> Result<(EventDraft, Vec<TicketDraft>), FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = required(&mut errors, "title", &self.title, 150);
        let description = required(&mut errors, "description", &self.description, 10_000);
        let location = optional(&mut errors, "location", &self.location, 150);

        let genre = self.genre.trim().to_string();
        if !GENRES.contains(&genre.as_str()) {
            errors.add("genre", format!("Choose one of: {}", GENRES.join(", ")));
        }

        let event_date = match NaiveDate::parse_from_str(self.event_date.trim(), DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add("event_date", "Enter a date as YYYY-MM-DD");
                None
            }
        };
        let start_time = parse_time(&self.start_time);
        if start_time.is_none() {
            errors.add("start_time", "Enter a start time as HH:MM");
        }
        let end_time = if self.end_time.trim().is_empty() {
            None
        } else {
            let parsed = parse_time(&self.end_time);
            match (parsed, start_time) {
                (None, _) => errors.add("end_time", "Enter an end time as HH:MM"),
                (Some(end), Some(start)) if end < start => {
                    errors.add("end_time", "End time cannot be before the start time")
                }
                _ => {}
            }
            parsed
        };

        let status = if allow_status && !self.status.trim().is_empty() {
            match EventStatus::from_str(&self.status) {
                Ok(status) => Some(status),
                Err(e) => {
                    errors.add("status", e.to_string());
                    None
                }
            }
        } else {
            None
        };

        let tickets = self.ticket_rows(&mut errors);

        match (event_date, start_time) {
            (Some(event_date), Some(start_time)) if errors.is_empty() => Ok((
                EventDraft {
                    title,
                    description,
                    genre,
                    location,
                    event_date,
                    start_time,
                    end_time,
                    image: None,
                    status,
                },
                tickets,
            )),
            _ => Err(errors),
        }
    }

    fn ticket_rows(&self, errors: &mut FieldErrors) -> Vec<TicketDraft> {
        let rows = self
            .ticket_labels
            .len()
            .max(self.ticket_prices.len())
            .max(self.ticket_quotas.len());

        let mut tickets = Vec::with_capacity(rows);
        for i in 0..rows {
            let label = cell(&self.ticket_labels, i);
            let price = cell(&self.ticket_prices, i);
            let quota = cell(&self.ticket_quotas, i);
            if label.is_empty() && price.is_empty() && quota.is_empty() {
                continue;
            }

            let label = required(errors, &format!("ticket_label[{i}]"), label, 100);
            let price = match Decimal::from_str(price) {
                Ok(p) if p.is_sign_negative() => {
                    errors.add(&format!("ticket_price[{i}]"), "Price cannot be negative");
                    Decimal::ZERO
                }
                Ok(p) if p.scale() > 2 => {
                    errors.add(&format!("ticket_price[{i}]"), "Price has at most two decimals");
                    Decimal::ZERO
                }
                Ok(p) if p > max_ticket_price() => {
                    errors.add(
                        &format!("ticket_price[{i}]"),
                        format!("Price cannot exceed {}", max_ticket_price()),
                    );
                    Decimal::ZERO
                }
                Ok(p) => p,
                Err(_) => {
                    errors.add(&format!("ticket_price[{i}]"), "Enter a price");
                    Decimal::ZERO
                }
            };
            let quota = if quota.is_empty() {
                None
            } else {
                match quota.parse::<i32>() {
                    Ok(q) if q >= 0 => Some(q),
                    _ => {
                        errors.add(
                            &format!("ticket_quota[{i}]"),
                            "Quota must be a whole number of zero or more",
                        );
                        None
                    }
                }
            };

            tickets.push(TicketDraft { label, price, quota });
        }
        tickets
    }
}

fn cell(column: &[String], i: usize) -> &str {
    column.get(i).map(|s| s.trim()).unwrap_or("")
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value.trim(), format).ok())
}

fn malformed(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::field("form", format!("Malformed upload: {}", err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EventForm {
        EventForm {
            title: "CTRL".into(),
            genre: "R&B".into(),
            description: "Anniversary tour".into(),
            location: "Riverstage".into(),
            event_date: "2030-03-14".into(),
            start_time: "19:30".into(),
            end_time: "23:00".into(),
            ticket_labels: vec!["Standard".into(), "VIP".into()],
            ticket_prices: vec!["60.00".into(), "150".into()],
            ticket_quotas: vec!["150".into(), "".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_form_yields_draft_and_rows() {
        let (draft, tickets) = form().validate(false).expect("valid");
        assert_eq!(draft.title, "CTRL");
        assert_eq!(draft.status, None);
        assert_eq!(
            tickets,
            vec![
                TicketDraft {
                    label: "Standard".into(),
                    price: Decimal::new(6000, 2),
                    quota: Some(150)
                },
                TicketDraft {
                    label: "VIP".into(),
                    price: Decimal::new(150, 0),
                    quota: None
                },
            ]
        );
    }

    #[test]
    fn test_blank_ticket_rows_are_skipped() {
        let mut f = form();
        f.ticket_labels.push(" ".into());
        f.ticket_prices.push(String::new());
        f.ticket_quotas.push(String::new());
        let (_, tickets) = f.validate(false).expect("valid");
        assert_eq!(tickets.len(), 2);
    }

    #[test]
    fn test_bad_ticket_cells_reported_by_row() {
        let mut f = form();
        f.ticket_prices[1] = "-5".into();
        f.ticket_quotas[0] = "lots".into();
        let errors = f.validate(false).expect_err("invalid");
        assert!(errors.get("ticket_price[1]").is_some());
        assert!(errors.get("ticket_quota[0]").is_some());
    }

    #[test]
    fn test_price_must_fit_the_column() {
        let mut f = form();
        f.ticket_prices[0] = "99999999.99".into();
        assert!(f.validate(false).is_ok());

        f.ticket_prices[0] = "123456789012".into();
        let errors = f.validate(false).expect_err("too large");
        assert!(errors.get("ticket_price[0]").is_some());

        f.ticket_prices[0] = "100000000".into();
        assert!(f.validate(false).is_err());
    }

    #[test]
    fn test_unknown_genre_and_bad_date_rejected() {
        let mut f = form();
        f.genre = "Polka".into();
        f.event_date = "14/03/2030".into();
        let errors = f.validate(false).expect_err("invalid");
        assert!(errors.get("genre").is_some());
        assert!(errors.get("event_date").is_some());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut f = form();
        f.end_time = "18:00".into();
        assert!(f.validate(false).expect_err("invalid").get("end_time").is_some());
    }

    #[test]
    fn test_status_only_read_when_allowed() {
        let mut f = form();
        f.status = "Cancelled".into();
        assert_eq!(f.validate(false).expect("valid").0.status, None);
        assert_eq!(
            f.validate(true).expect("valid").0.status,
            Some(EventStatus::Cancelled)
        );
    }
}
