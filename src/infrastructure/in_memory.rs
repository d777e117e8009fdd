use crate::domain::form::{CreateFormData, Form};
use crate::domain::ports::TicketApi;
use crate::domain::ticket::{
    CreateTicketData, Invoice, PaymentStatus, Ticket, WebhookPayload,
};
use crate::domain::wallet::{ApiKey, Wallet};
use crate::error::{Result, TicketError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One request received by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateTicket { form_id: String },
    PaymentStatus { payment_hash: String },
    ListTickets,
    DeleteTicket { ticket_id: String },
    ListForms,
    CreateForm,
    UpdateForm { form_id: String },
    DeleteForm { form_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Admin,
    Invoice,
}

#[derive(Default)]
struct Backend {
    wallets: Vec<Wallet>,
    forms: Vec<Form>,
    tickets: Vec<Ticket>,
    calls: Vec<ApiCall>,
    webhooks: Vec<(String, WebhookPayload)>,
    status_failures: VecDeque<u16>,
    outage: Option<u16>,
}

impl Backend {
    fn record(&mut self, call: ApiCall) -> Result<()> {
        debug!(?call, "in-memory request");
        self.calls.push(call);
        match self.outage {
            Some(status) => Err(TicketError::api(status, "Service unavailable")),
            None => Ok(()),
        }
    }

    fn authenticate(&self, key: &ApiKey) -> Result<(&Wallet, KeyKind)> {
        self.wallets
            .iter()
            .find_map(|w| {
                if &w.adminkey == key {
                    Some((w, KeyKind::Admin))
                } else if &w.inkey == key {
                    Some((w, KeyKind::Invoice))
                } else {
                    None
                }
            })
            .ok_or_else(|| TicketError::api(401, "Invalid key."))
    }

    fn require_admin(&self, key: &ApiKey) -> Result<String> {
        match self.authenticate(key)? {
            (wallet, KeyKind::Admin) => Ok(wallet.id.clone()),
            (_, KeyKind::Invoice) => Err(TicketError::api(401, "Invalid adminkey.")),
        }
    }

    fn form_mut(&mut self, form_id: &str) -> Result<&mut Form> {
        self.forms
            .iter_mut()
            .find(|f| f.id == form_id)
            .ok_or_else(|| TicketError::api(404, "Form does not exist."))
    }

    /// Flips a ticket to paid once, credits its form and queues the webhook.
    fn set_ticket_paid(&mut self, payment_hash: &str) -> Result<Ticket> {
        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| t.id == payment_hash)
            .ok_or_else(|| TicketError::api(404, "LNTicket does not exist."))?;
        if ticket.paid {
            return Ok(ticket.clone());
        }
        ticket.paid = true;
        let ticket = ticket.clone();

        let form = self.form_mut(&ticket.form)?;
        form.amountmade += ticket.sats;
        if let Some(url) = form.webhook.clone() {
            self.webhooks.push((url, WebhookPayload::from(&ticket)));
        }
        info!(ticket = %ticket.id, sats = ticket.sats, "ticket paid");
        Ok(ticket)
    }
}

/// An in-process backend honouring the same contract as the real extension.
///
/// All registered wallets belong to one user, so `all_wallets` listings span
/// every wallet. Invoices are settled explicitly with [`InMemoryTicketApi::settle`].
#[derive(Default, Clone)]
pub struct InMemoryTicketApi {
    backend: Arc<RwLock<Backend>>,
}

impl InMemoryTicketApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_wallet(&self, wallet: Wallet) {
        self.backend.write().await.wallets.push(wallet);
    }

    /// Marks the invoice behind `payment_hash` as paid.
    pub async fn settle(&self, payment_hash: &str) -> Result<Ticket> {
        self.backend.write().await.set_ticket_paid(payment_hash)
    }

    /// Makes the next status checks fail with the given HTTP statuses, in order.
    pub async fn fail_status_checks(&self, statuses: impl IntoIterator<Item = u16>) {
        self.backend
            .write()
            .await
            .status_failures
            .extend(statuses);
    }

    /// While set, every request fails with this status.
    pub async fn set_outage(&self, status: Option<u16>) {
        self.backend.write().await.outage = status;
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.backend.read().await.calls.clone()
    }

    pub async fn status_checks_for(&self, payment_hash: &str) -> usize {
        self.backend
            .read()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, ApiCall::PaymentStatus { payment_hash: h } if h == payment_hash))
            .count()
    }

    pub async fn forms(&self) -> Vec<Form> {
        self.backend.read().await.forms.clone()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.backend.read().await.tickets.clone()
    }

    pub async fn webhook_deliveries(&self) -> Vec<(String, WebhookPayload)> {
        self.backend.read().await.webhooks.clone()
    }
}

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or_default()
}

fn short_hash() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(22)
        .map(char::from)
        .collect()
}

fn payment_hash() -> String {
    rand::random::<[u8; 32]>()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[async_trait]
impl TicketApi for InMemoryTicketApi {
    async fn create_ticket(&self, form_id: &str, data: &CreateTicketData) -> Result<Invoice> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::CreateTicket {
            form_id: form_id.to_string(),
        })?;

        let wallet = backend
            .forms
            .iter()
            .find(|f| f.id == form_id)
            .map(|f| f.wallet.clone())
            .ok_or_else(|| TicketError::api(404, "LNTicket does not exist."))?;
        if data.sats < 1 {
            return Err(TicketError::api(400, "0 invoices not allowed."));
        }

        let hash = payment_hash();
        let invoice = Invoice {
            payment_request: format!("lnbc{}0n1p{}", data.sats, &hash[..24]),
            payment_hash: hash.clone(),
        };
        backend.tickets.push(Ticket {
            id: hash,
            form: data.form.clone(),
            wallet,
            name: data.name.clone(),
            email: data.email.clone(),
            ltext: data.ltext.clone(),
            sats: data.sats,
            paid: false,
            time: now(),
        });
        Ok(invoice)
    }

    async fn payment_status(&self, payment_hash: &str) -> Result<PaymentStatus> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::PaymentStatus {
            payment_hash: payment_hash.to_string(),
        })?;
        if let Some(status) = backend.status_failures.pop_front() {
            return Err(TicketError::api(status, "Status check failed"));
        }
        backend
            .tickets
            .iter()
            .find(|t| t.id == payment_hash)
            .map(|t| PaymentStatus { paid: t.paid })
            .ok_or_else(|| TicketError::api(404, "LNTicket does not exist."))
    }

    async fn list_tickets(&self, key: &ApiKey) -> Result<Vec<Ticket>> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::ListTickets)?;
        backend.authenticate(key)?;
        Ok(backend.tickets.clone())
    }

    async fn delete_ticket(&self, ticket_id: &str, key: &ApiKey) -> Result<()> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::DeleteTicket {
            ticket_id: ticket_id.to_string(),
        })?;
        let wallet = backend.require_admin(key)?;
        let ticket = backend
            .tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| TicketError::api(404, "LNTicket does not exist."))?;
        if ticket.wallet != wallet {
            return Err(TicketError::api(403, "Not your ticket."));
        }
        backend.tickets.retain(|t| t.id != ticket_id);
        Ok(())
    }

    async fn list_forms(&self, key: &ApiKey) -> Result<Vec<Form>> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::ListForms)?;
        backend.authenticate(key)?;
        Ok(backend.forms.clone())
    }

    async fn create_form(&self, data: &CreateFormData, key: &ApiKey) -> Result<Form> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::CreateForm)?;
        let wallet = backend.require_admin(key)?;
        if data.wallet != wallet {
            return Err(TicketError::api(403, "Not your wallet."));
        }
        let form = Form {
            id: short_hash(),
            wallet: data.wallet.clone(),
            name: data.name.clone(),
            webhook: data.webhook.clone(),
            description: data.description.clone(),
            flatrate: data.flatrate,
            amount: data.amount,
            amountmade: 0,
            time: now(),
        };
        backend.forms.push(form.clone());
        Ok(form)
    }

    async fn update_form(
        &self,
        form_id: &str,
        data: &CreateFormData,
        key: &ApiKey,
    ) -> Result<Form> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::UpdateForm {
            form_id: form_id.to_string(),
        })?;
        let wallet = backend.require_admin(key)?;
        let form = backend.form_mut(form_id)?;
        if form.wallet != wallet {
            return Err(TicketError::api(403, "Not your form."));
        }
        form.wallet = data.wallet.clone();
        form.name = data.name.clone();
        form.webhook = data.webhook.clone();
        form.description = data.description.clone();
        form.flatrate = data.flatrate;
        form.amount = data.amount;
        Ok(form.clone())
    }

    async fn delete_form(&self, form_id: &str, key: &ApiKey) -> Result<()> {
        let mut backend = self.backend.write().await;
        backend.record(ApiCall::DeleteForm {
            form_id: form_id.to_string(),
        })?;
        let wallet = backend.require_admin(key)?;
        if backend.form_mut(form_id)?.wallet != wallet {
            return Err(TicketError::api(403, "Not your form."));
        }
        backend.forms.retain(|f| f.id != form_id);
        Ok(())
    }
}
