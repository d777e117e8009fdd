use super::wire::{flexible_bool, format_date, unix_time};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A submission against a form. Its id is the payment hash of its invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub form: String,
    pub wallet: String,
    pub name: String,
    pub email: String,
    pub ltext: String,
    /// Cost in sats, fixed at submission time.
    pub sats: u64,
    #[serde(deserialize_with = "flexible_bool")]
    pub paid: bool,
    #[serde(with = "unix_time")]
    pub time: DateTime<Utc>,
}

impl Ticket {
    pub fn date(&self) -> String {
        format_date(&self.time)
    }

    pub fn card(&self) -> TicketCard {
        TicketCard {
            date: self.date(),
            name: self.name.clone(),
            email: self.email.clone(),
            content: self.ltext.clone(),
        }
    }
}

/// Body of the public ticket creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTicketData {
    pub form: String,
    pub name: String,
    pub email: String,
    pub ltext: String,
    pub sats: u64,
}

/// The Lightning invoice returned when a ticket is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub payment_hash: String,
    pub payment_request: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub paid: bool,
}

/// Detail card for one ticket in the admin view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCard {
    pub date: String,
    pub name: String,
    pub email: String,
    pub content: String,
}

/// Payload the backend posts to a form's webhook once a ticket is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub form: String,
    pub name: String,
    pub email: String,
    pub content: String,
}

impl From<&Ticket> for WebhookPayload {
    fn from(ticket: &Ticket) -> Self {
        Self {
            form: ticket.form.clone(),
            name: ticket.name.clone(),
            email: ticket.email.clone(),
            content: ticket.ltext.clone(),
        }
    }
}
