use super::pricing::PricingRule;
use super::wire::{flexible_bool, format_date, unix_time};
use crate::error::{Result, TicketError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A priced submission template owned by one of the operator's wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    pub wallet: String,
    pub name: String,
    #[serde(default)]
    pub webhook: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub flatrate: bool,
    pub amount: u64,
    /// Sats collected from paid tickets so far.
    #[serde(default)]
    pub amountmade: u64,
    #[serde(with = "unix_time")]
    pub time: DateTime<Utc>,
}

impl Form {
    pub fn pricing(&self) -> PricingRule {
        PricingRule::from_form_fields(self.flatrate, self.amount)
    }

    pub fn date(&self) -> String {
        format_date(&self.time)
    }

    /// Where submitters fill this form, relative to the extension base url.
    pub fn public_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.id)
    }
}

/// Body of the create and update form requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFormData {
    pub wallet: String,
    pub name: String,
    #[serde(default)]
    pub webhook: Option<String>,
    pub description: String,
    pub flatrate: bool,
    pub amount: u64,
}

impl CreateFormData {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TicketError::Validation("Form name is required".to_string()));
        }
        if self.amount == 0 {
            return Err(TicketError::Validation(
                "Form amount must be at least 1 sat".to_string(),
            ));
        }
        if let Some(webhook) = &self.webhook
            && !(webhook.starts_with("http://") || webhook.starts_with("https://"))
        {
            return Err(TicketError::Validation(format!(
                "Webhook must be an http(s) url: {webhook}"
            )));
        }
        Ok(())
    }
}

/// The part of a form a submitter sees.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicForm {
    pub id: String,
    pub name: String,
    pub description: String,
    pub pricing: PricingRule,
}

impl From<&Form> for PublicForm {
    fn from(form: &Form) -> Self {
        Self {
            id: form.id.clone(),
            name: form.name.clone(),
            description: form.description.clone(),
            pricing: form.pricing(),
        }
    }
}
