use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketType {
    pub id: i64,
    pub event_id: i64,
    pub label: String,
    pub price: Decimal,
    pub quota: Option<i32>,
}

impl TicketType {
    /// Text shown in the booking selector, e.g. `Standard - $60.00`.
    pub fn choice_label(&self) -> String {
        format!("{} - ${:.2}", self.label, self.price)
    }
}

/// One validated row of the ticket-type editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub label: String,
    pub price: Decimal,
    pub quota: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_label_formats_price_with_cents() {
        let ticket = TicketType {
            id: 1,
            event_id: 1,
            label: "Standard".into(),
            price: Decimal::new(60, 0),
            quota: Some(150),
        };
        assert_eq!(ticket.choice_label(), "Standard - $60.00");
    }
}
