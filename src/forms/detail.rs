use serde::Deserialize;

use super::FieldErrors;

pub const COMMENT_MAX_CHARS: usize = 500;
pub const MIN_TICKETS_PER_BOOKING: i32 = 1;
pub const MAX_TICKETS_PER_BOOKING: i32 = 10;

/// Body of `POST /event/{id}`; `form` names which of the two forms on the
/// detail page was submitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetailForm {
    pub form: String,
    pub content: String,
    pub ticket_type: String,
    #[serde(alias = "ticket_quantity")]
    pub quantity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailAction {
    Comment { content: String },
    Booking { ticket_type_id: i64, quantity: i32 },
}

impl DetailForm {
    pub fn validate(self) -> Result<DetailAction, FieldErrors> {
        match self.form.as_str() {
            "comment" => validate_comment(&self.content),
            "booking" => validate_booking(&self.ticket_type, &self.quantity),
            _ => Err(FieldErrors::single(
                "form",
                "Expected either a comment or a booking submission",
            )),
        }
    }
}

fn validate_comment(content: &str) -> Result<DetailAction, FieldErrors> {
    let mut errors = FieldErrors::new();
    let content = content.trim();
    let len = content.chars().count();
    if len == 0 {
        errors.add("content", "Write a comment before posting");
    } else if len > COMMENT_MAX_CHARS {
        errors.add(
            "content",
            format!("Comments are limited to {COMMENT_MAX_CHARS} characters"),
        );
    }
    errors.finish(DetailAction::Comment {
        content: content.to_string(),
    })
}

fn validate_booking(ticket_type: &str, quantity: &str) -> Result<DetailAction, FieldErrors> {
    let mut errors = FieldErrors::new();

    let ticket_type_id = match ticket_type.trim().parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => {
            errors.add("ticket_type", "Choose a ticket type");
            0
        }
    };

    let quantity = match quantity.trim().parse::<i32>() {
        Ok(n) if (MIN_TICKETS_PER_BOOKING..=MAX_TICKETS_PER_BOOKING).contains(&n) => n,
        Ok(_) => {
            errors.add(
                "quantity",
                format!(
                    "Number of tickets must be between {MIN_TICKETS_PER_BOOKING} and {MAX_TICKETS_PER_BOOKING}"
                ),
            );
            0
        }
        Err(_) => {
            errors.add("quantity", "Enter a whole number of tickets");
            0
        }
    };

    errors.finish(DetailAction::Booking {
        ticket_type_id,
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(quantity: &str) -> DetailForm {
        DetailForm {
            form: "booking".into(),
            ticket_type: "7".into(),
            quantity: quantity.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_booking_quantity_bounds() {
        assert_eq!(
            booking("4").validate(),
            Ok(DetailAction::Booking {
                ticket_type_id: 7,
                quantity: 4
            })
        );
        assert!(booking("1").validate().is_ok());
        assert!(booking("10").validate().is_ok());
        for bad in ["0", "11", "-3", "two", ""] {
            let errors = booking(bad).validate().expect_err(bad);
            assert!(errors.get("quantity").is_some());
        }
    }

    #[test]
    fn test_comment_length_bounds() {
        let ok = DetailForm {
            form: "comment".into(),
            content: "x".repeat(COMMENT_MAX_CHARS),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        for content in [String::new(), "   ".to_string(), "x".repeat(COMMENT_MAX_CHARS + 1)] {
            let form = DetailForm {
                form: "comment".into(),
                content,
                ..Default::default()
            };
            assert!(form.validate().is_err());
        }
    }

    #[test]
    fn test_unknown_form_rejected() {
        let errors = DetailForm::default().validate().expect_err("no form");
        assert!(errors.get("form").is_some());
    }
}
