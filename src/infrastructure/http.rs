use crate::domain::form::{CreateFormData, Form};
use crate::domain::ports::TicketApi;
use crate::domain::ticket::{CreateTicketData, Invoice, PaymentStatus, Ticket};
use crate::domain::wallet::ApiKey;
use crate::error::{Result, TicketError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Header the platform reads wallet keys from.
pub const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// `TicketApi` over the extension's REST endpoints.
#[derive(Clone)]
pub struct HttpTicketApi {
    client: Client,
    base_url: Url,
}

impl HttpTicketApi {
    /// Creates a client for the extension mounted at `base_url`
    /// (e.g. `http://localhost:5000/lnticket`).
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TicketError::Config(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TicketError::Config(format!(
                "base url {base_url} cannot hold a path"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// `{base}/api/v1/{segments..}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1"]).extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "api response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.detail)
            .unwrap_or(body);
        Err(TicketError::api(status.as_u16(), detail))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json().await?)
    }
}

#[async_trait]
impl TicketApi for HttpTicketApi {
    async fn create_ticket(&self, form_id: &str, data: &CreateTicketData) -> Result<Invoice> {
        let request = self
            .client
            .post(self.url(&["tickets", form_id]))
            .json(data);
        self.fetch(request).await
    }

    async fn payment_status(&self, payment_hash: &str) -> Result<PaymentStatus> {
        let request = self.client.get(self.url(&["tickets", payment_hash]));
        self.fetch(request).await
    }

    async fn list_tickets(&self, key: &ApiKey) -> Result<Vec<Ticket>> {
        let request = self
            .client
            .get(self.url(&["tickets"]))
            .query(&[("all_wallets", "true")])
            .header(API_KEY_HEADER, key.as_str());
        self.fetch(request).await
    }

    async fn delete_ticket(&self, ticket_id: &str, key: &ApiKey) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&["tickets", ticket_id]))
            .header(API_KEY_HEADER, key.as_str());
        self.send(request).await?;
        Ok(())
    }

    async fn list_forms(&self, key: &ApiKey) -> Result<Vec<Form>> {
        let request = self
            .client
            .get(self.url(&["forms"]))
            .query(&[("all_wallets", "true")])
            .header(API_KEY_HEADER, key.as_str());
        self.fetch(request).await
    }

    async fn create_form(&self, data: &CreateFormData, key: &ApiKey) -> Result<Form> {
        let request = self
            .client
            .post(self.url(&["forms"]))
            .header(API_KEY_HEADER, key.as_str())
            .json(data);
        self.fetch(request).await
    }

    async fn update_form(
        &self,
        form_id: &str,
        data: &CreateFormData,
        key: &ApiKey,
    ) -> Result<Form> {
        let request = self
            .client
            .put(self.url(&["forms", form_id]))
            .header(API_KEY_HEADER, key.as_str())
            .json(data);
        self.fetch(request).await
    }

    async fn delete_form(&self, form_id: &str, key: &ApiKey) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&["forms", form_id]))
            .header(API_KEY_HEADER, key.as_str());
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> HttpTicketApi {
        HttpTicketApi::with_client(Client::new(), base_url).unwrap()
    }

    #[test]
    fn test_url_joins_base_and_path() {
        assert_eq!(
            api("http://localhost:5000/lnticket/").url(&["tickets", "abc"]).as_str(),
            "http://localhost:5000/lnticket/api/v1/tickets/abc"
        );
        assert_eq!(
            api("http://localhost:5000").url(&["forms"]).as_str(),
            "http://localhost:5000/api/v1/forms"
        );
    }

    #[test]
    fn test_ids_cannot_escape_their_path_segment() {
        assert_eq!(
            api("http://localhost:5000/lnticket")
                .url(&["tickets", "../forms/x?all_wallets=true#y"])
                .as_str(),
            "http://localhost:5000/lnticket/api/v1/tickets/..%2Fforms%2Fx%3Fall_wallets=true%23y"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(matches!(
            HttpTicketApi::with_client(Client::new(), "not a url"),
            Err(TicketError::Config(_))
        ));
        assert!(matches!(
            HttpTicketApi::with_client(Client::new(), "mailto:ops@example.com"),
            Err(TicketError::Config(_))
        ));
    }
}
