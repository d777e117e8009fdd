use super::form::{CreateFormData, Form};
use super::ticket::{CreateTicketData, Invoice, PaymentStatus, Ticket};
use super::wallet::ApiKey;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The extension's REST surface.
///
/// Ticket creation and payment status are public; listing takes a
/// read-capable key and every mutation takes the owning wallet's admin key.
#[async_trait]
pub trait TicketApi: Send + Sync {
    async fn create_ticket(&self, form_id: &str, data: &CreateTicketData) -> Result<Invoice>;
    async fn payment_status(&self, payment_hash: &str) -> Result<PaymentStatus>;
    async fn list_tickets(&self, key: &ApiKey) -> Result<Vec<Ticket>>;
    async fn delete_ticket(&self, ticket_id: &str, key: &ApiKey) -> Result<()>;
    async fn list_forms(&self, key: &ApiKey) -> Result<Vec<Form>>;
    async fn create_form(&self, data: &CreateFormData, key: &ApiKey) -> Result<Form>;
    async fn update_form(&self, form_id: &str, data: &CreateFormData, key: &ApiKey)
    -> Result<Form>;
    async fn delete_form(&self, form_id: &str, key: &ApiKey) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Positive,
    Warning,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoticeId(pub u64);

/// User-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
    /// Shows a notice that stays up until dismissed.
    fn show_waiting(&self, message: &str) -> NoticeId;
    fn dismiss(&self, id: NoticeId);
}

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

pub type TicketApiRef = Arc<dyn TicketApi>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type ConfirmBox = Box<dyn Confirm>;
