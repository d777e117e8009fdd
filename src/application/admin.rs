use crate::domain::form::{CreateFormData, Form};
use crate::domain::ports::{ConfirmBox, NoticeKind, NotifierRef, TicketApiRef};
use crate::domain::pricing::PricingRule;
use crate::domain::ticket::{Ticket, TicketCard};
use crate::domain::wallet::{ApiKey, Wallet};
use crate::error::{Result, TicketError};
use crate::interfaces::csv::table_writer::TableWriter;
use std::io::Write;
use tracing::{debug, info};

pub const DELETE_TICKET_PROMPT: &str = "Are you sure you want to delete this ticket";
pub const DELETE_FORM_PROMPT: &str = "Are you sure you want to delete this form link?";

/// Form being created or edited in the admin dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    /// Set when editing an existing form.
    pub id: Option<String>,
    pub wallet: Option<String>,
    pub name: String,
    pub webhook: Option<String>,
    pub description: String,
    pub flatrate: bool,
    pub amount: u64,
}

impl FormDraft {
    pub fn pricing_label(&self) -> &'static str {
        PricingRule::from_form_fields(self.flatrate, self.amount).label()
    }

    fn to_data(&self, wallet: &str) -> CreateFormData {
        CreateFormData {
            wallet: wallet.to_string(),
            name: self.name.clone(),
            webhook: self.webhook.clone().filter(|w| !w.trim().is_empty()),
            description: self.description.clone(),
            flatrate: self.flatrate,
            amount: self.amount,
        }
    }
}

impl From<&Form> for FormDraft {
    fn from(form: &Form) -> Self {
        Self {
            id: Some(form.id.clone()),
            wallet: Some(form.wallet.clone()),
            name: form.name.clone(),
            webhook: form.webhook.clone(),
            description: form.description.clone(),
            flatrate: form.flatrate,
            amount: form.amount,
        }
    }
}

/// View-model of the operator's page: forms, paid tickets and the form dialog.
///
/// Lists only change after the backend confirms a request. Every failure is
/// reported once through the notifier and returned to the caller.
pub struct AdminView {
    api: TicketApiRef,
    notifier: NotifierRef,
    confirm: ConfirmBox,
    wallets: Vec<Wallet>,
    read_key: ApiKey,
    forms: Vec<Form>,
    tickets: Vec<Ticket>,
    draft: FormDraft,
}

impl AdminView {
    /// Lists are read with `read_key`, or the first wallet's invoice key.
    pub fn new(
        api: TicketApiRef,
        notifier: NotifierRef,
        confirm: ConfirmBox,
        wallets: Vec<Wallet>,
        read_key: Option<ApiKey>,
    ) -> Result<Self> {
        let read_key = match (read_key, wallets.first()) {
            (Some(key), _) => key,
            (None, Some(wallet)) => wallet.inkey.clone(),
            (None, None) => {
                return Err(TicketError::Config("no wallets configured".to_string()));
            }
        };
        Ok(Self {
            api,
            notifier,
            confirm,
            wallets,
            read_key,
            forms: Vec::new(),
            tickets: Vec::new(),
            draft: FormDraft::default(),
        })
    }

    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut FormDraft {
        &mut self.draft
    }

    pub fn reset_draft(&mut self) {
        self.draft = FormDraft::default();
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.notifier.notify(NoticeKind::Negative, &e.to_string());
        }
        result
    }

    fn admin_key(&self, wallet_id: &str) -> Result<ApiKey> {
        self.wallets
            .iter()
            .find(|w| w.id == wallet_id)
            .map(|w| w.adminkey.clone())
            .ok_or_else(|| TicketError::UnknownWallet(wallet_id.to_string()))
    }

    /// Loads both tables.
    pub async fn refresh(&mut self) -> Result<()> {
        self.load_tickets().await?;
        self.load_forms().await
    }

    /// Loads the paid tickets of all the operator's wallets.
    pub async fn load_tickets(&mut self) -> Result<()> {
        let tickets = self.api.list_tickets(&self.read_key).await;
        let tickets = self.report(tickets)?;
        self.tickets = tickets.into_iter().filter(|t| t.paid).collect();
        debug!(count = self.tickets.len(), "tickets loaded");
        Ok(())
    }

    pub async fn load_forms(&mut self) -> Result<()> {
        let forms = self.api.list_forms(&self.read_key).await;
        self.forms = self.report(forms)?;
        debug!(count = self.forms.len(), "forms loaded");
        Ok(())
    }

    /// Opens the dialog on an existing form.
    pub fn edit_form(&mut self, form_id: &str) -> Result<()> {
        let form = self
            .forms
            .iter()
            .find(|f| f.id == form_id)
            .ok_or_else(|| TicketError::NotFound(format!("form {form_id}")));
        let form = self.report(form)?;
        self.draft = FormDraft::from(form);
        Ok(())
    }

    /// Creates or updates the form in the dialog, depending on whether it has an id.
    pub async fn save_form(&mut self) -> Result<Form> {
        let result = self.send_draft().await;
        let form = self.report(result)?;
        self.reset_draft();
        Ok(form)
    }

    async fn send_draft(&mut self) -> Result<Form> {
        let wallet = self
            .draft
            .wallet
            .clone()
            .ok_or_else(|| TicketError::Validation("Choose a wallet for the form".to_string()))?;
        let key = self.admin_key(&wallet)?;
        let data = self.draft.to_data(&wallet);
        data.validate()?;

        match self.draft.id.clone() {
            Some(id) => {
                let form = self.api.update_form(&id, &data, &key).await?;
                self.forms.retain(|f| f.id != id);
                self.forms.push(form.clone());
                info!(form = %form.id, "form updated");
                Ok(form)
            }
            None => {
                let form = self.api.create_form(&data, &key).await?;
                self.forms.push(form.clone());
                info!(form = %form.id, "form created");
                Ok(form)
            }
        }
    }

    /// Deletes a form after confirmation. Returns `false` if the user declined.
    pub async fn delete_form(&mut self, form_id: &str) -> Result<bool> {
        let key = self
            .forms
            .iter()
            .find(|f| f.id == form_id)
            .ok_or_else(|| TicketError::NotFound(format!("form {form_id}")))
            .and_then(|f| self.admin_key(&f.wallet));
        let key = self.report(key)?;

        if !self.confirm.confirm(DELETE_FORM_PROMPT).await {
            return Ok(false);
        }
        let deleted = self.api.delete_form(form_id, &key).await;
        self.report(deleted)?;
        self.forms.retain(|f| f.id != form_id);
        info!(form = %form_id, "form deleted");
        Ok(true)
    }

    /// Deletes a ticket after confirmation. Returns `false` if the user declined.
    pub async fn delete_ticket(&mut self, ticket_id: &str) -> Result<bool> {
        let key = self
            .tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| TicketError::NotFound(format!("ticket {ticket_id}")))
            .and_then(|t| self.admin_key(&t.wallet));
        let key = self.report(key)?;

        if !self.confirm.confirm(DELETE_TICKET_PROMPT).await {
            return Ok(false);
        }
        let deleted = self.api.delete_ticket(ticket_id, &key).await;
        self.report(deleted)?;
        self.tickets.retain(|t| t.id != ticket_id);
        info!(ticket = %ticket_id, "ticket deleted");
        Ok(true)
    }

    pub fn ticket_card(&self, ticket_id: &str) -> Option<TicketCard> {
        self.tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .map(Ticket::card)
    }

    pub fn export_forms_csv<W: Write>(&self, out: W) -> Result<()> {
        TableWriter::new(out).write_forms(&self.forms)
    }

    pub fn export_tickets_csv<W: Write>(&self, out: W) -> Result<()> {
        TableWriter::new(out).write_tickets(&self.tickets)
    }
}
