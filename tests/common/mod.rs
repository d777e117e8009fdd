#![allow(dead_code)]

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use lnticket::domain::form::{CreateFormData, Form};
use lnticket::domain::ports::TicketApi;
use lnticket::domain::ticket::{CreateTicketData, Invoice, PaymentStatus, Ticket};
use lnticket::domain::wallet::{ApiKey, Wallet};
use lnticket::error::TicketError;
use lnticket::infrastructure::http::API_KEY_HEADER;
use lnticket::infrastructure::in_memory::InMemoryTicketApi;
use std::sync::{Arc, Mutex};

/// A request as the stub server saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub uri: String,
    pub key: Option<String>,
}

/// The in-memory backend served over HTTP under `/lnticket`.
pub struct StubServer {
    pub base_url: String,
    pub api: InMemoryTicketApi,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl StubServer {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

pub async fn spawn_backend(api: InMemoryTicketApi) -> StubServer {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let routes = Router::new()
        .route("/tickets", get(list_tickets))
        .route(
            "/tickets/{id}",
            get(payment_status).post(create_ticket).delete(delete_ticket),
        )
        .route("/forms", get(list_forms).post(create_form))
        .route("/forms/{id}", put(update_form).delete(delete_form))
        .with_state(api.clone());
    let app = Router::new()
        .nest("/lnticket/api/v1", routes)
        .layer(middleware::from_fn_with_state(seen.clone(), record));

    let base_url = serve(app).await;
    StubServer {
        base_url: format!("{base_url}/lnticket"),
        api,
        seen,
    }
}

/// Serves `app` on an ephemeral port and returns its root url.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A backend with wallet `w1` (keys `admin1`/`inkey1`) owning one form.
pub async fn seeded_backend(flatrate: bool, amount: u64) -> (InMemoryTicketApi, Form) {
    let api = InMemoryTicketApi::new();
    api.add_wallet(Wallet::new("w1", "admin1", "inkey1")).await;
    let form = api
        .create_form(
            &CreateFormData {
                wallet: "w1".into(),
                name: "Letters".into(),
                webhook: None,
                description: "Write to us".into(),
                flatrate,
                amount,
            },
            &"admin1".into(),
        )
        .await
        .unwrap();
    (api, form)
}

async fn record(
    State(seen): State<Arc<Mutex<Vec<SeenRequest>>>>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.lock().unwrap().push(SeenRequest {
        method: request.method().to_string(),
        uri: request.uri().to_string(),
        key,
    });
    next.run(request).await
}

struct ApiFailure(TicketError);

impl From<TicketError> for ApiFailure {
    fn from(e: TicketError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            TicketError::Api { status, detail } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                detail,
            ),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

fn api_key(headers: &HeaderMap) -> ApiKey {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .into()
}

async fn create_ticket(
    State(api): State<InMemoryTicketApi>,
    Path(form_id): Path<String>,
    Json(data): Json<CreateTicketData>,
) -> Result<Json<Invoice>, ApiFailure> {
    Ok(Json(api.create_ticket(&form_id, &data).await?))
}

async fn payment_status(
    State(api): State<InMemoryTicketApi>,
    Path(payment_hash): Path<String>,
) -> Result<Json<PaymentStatus>, ApiFailure> {
    Ok(Json(api.payment_status(&payment_hash).await?))
}

async fn list_tickets(
    State(api): State<InMemoryTicketApi>,
    headers: HeaderMap,
) -> Result<Json<Vec<Ticket>>, ApiFailure> {
    Ok(Json(api.list_tickets(&api_key(&headers)).await?))
}

async fn delete_ticket(
    State(api): State<InMemoryTicketApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    api.delete_ticket(&id, &api_key(&headers)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_forms(
    State(api): State<InMemoryTicketApi>,
    headers: HeaderMap,
) -> Result<Json<Vec<Form>>, ApiFailure> {
    Ok(Json(api.list_forms(&api_key(&headers)).await?))
}

async fn create_form(
    State(api): State<InMemoryTicketApi>,
    headers: HeaderMap,
    Json(data): Json<CreateFormData>,
) -> Result<(StatusCode, Json<Form>), ApiFailure> {
    let form = api.create_form(&data, &api_key(&headers)).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

async fn update_form(
    State(api): State<InMemoryTicketApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(data): Json<CreateFormData>,
) -> Result<Json<Form>, ApiFailure> {
    Ok(Json(api.update_form(&id, &data, &api_key(&headers)).await?))
}

async fn delete_form(
    State(api): State<InMemoryTicketApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    api.delete_form(&id, &api_key(&headers)).await?;
    Ok(StatusCode::NO_CONTENT)
}
