use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::ProvisionError;
use crate::models::Vendor;
use crate::normalize::non_empty;
use crate::pipeline::{AutomationStatus, LeadPipeline, ProvisionOutcome};
use crate::vendors::hotmart::HotmartEvent;
use crate::vendors::kirvano::KirvanoEvent;
use crate::vendors::kiwify::KiwifyEvent;
use crate::vendors::{CustomerInfo, NormalizedSale, PaymentInfo, ProductInfo, SaleEventKind};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub pipeline: LeadPipeline,
    /// Shared secret required on webhook routes when set.
    pub webhook_token: Option<String>,
}

pub type SharedState = Arc<AppState>;

// ── Request and response types ────────────────────────────────────────

#[derive(Deserialize)]
pub struct WebhookQuery {
    /// Routes the lead into a specific workspace instead of the default.
    pub workspace: Option<Uuid>,
    /// Query-string alternative to the `x-webhook-token` header, for
    /// vendors that cannot send custom headers.
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct LeadCaptureRequest {
    pub name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub product: Option<String>,
    /// Vendor attribution; unknown labels fall back to `direct`.
    pub source: Option<String>,
    pub workspace_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub workspace_id: Uuid,
    pub lead_id: Uuid,
    pub lead_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_error: Option<String>,
    pub automation: AutomationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_error: Option<String>,
}

impl From<ProvisionOutcome> for WebhookResponse {
    fn from(outcome: ProvisionOutcome) -> Self {
        Self {
            status: "processed",
            workspace_id: outcome.workspace_id,
            lead_id: outcome.lead.id,
            lead_created: outcome.lead_created,
            order_id: outcome.order.map(|o| o.id),
            order_error: outcome.order_error,
            automation: outcome.automation,
            automation_error: outcome.automation_error,
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Unauthorized,
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "invalid webhook token".to_string(),
            ),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match &err {
            ProvisionError::UnusablePhone { .. } => ApiError::Unprocessable(err.to_string()),
            ProvisionError::NoWorkspace => ApiError::Internal(err.to_string()),
            ProvisionError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/webhooks/kirvano", post(kirvano_webhook))
        .route("/webhooks/kiwify", post(kiwify_webhook))
        .route("/webhooks/hotmart", post(hotmart_webhook))
        .route("/webhooks/lead", post(lead_capture))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn authorize(state: &AppState, headers: &HeaderMap, query: &WebhookQuery) -> Result<(), ApiError> {
    let Some(expected) = state.webhook_token.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get("x-webhook-token")
        .and_then(|v| v.to_str().ok())
        .or(query.token.as_deref());
    if presented == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Shared tail of every vendor handler: events we do not model are
/// acknowledged with 200 so the vendor stops retrying, everything else
/// runs the pipeline.
async fn process_vendor(
    state: &AppState,
    sale: Option<NormalizedSale>,
    vendor: &'static str,
    label: &str,
    workspace: Option<Uuid>,
) -> Result<Response, ApiError> {
    let Some(sale) = sale else {
        info!(vendor, event = label, "ignoring unhandled event");
        return Ok(
            Json(serde_json::json!({"status": "ignored", "event": label})).into_response(),
        );
    };
    let outcome = state.pipeline.process(sale, workspace).await?;
    Ok(Json(WebhookResponse::from(outcome)).into_response())
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "leadgate"}))
}

async fn kirvano_webhook(
    State(state): State<SharedState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    Json(payload): Json<KirvanoEvent>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, &query)?;
    let label = payload.event.clone();
    process_vendor(&state, payload.normalize(), "kirvano", &label, query.workspace).await
}

async fn kiwify_webhook(
    State(state): State<SharedState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    Json(payload): Json<KiwifyEvent>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, &query)?;
    let label = payload.event_label().to_string();
    process_vendor(&state, payload.normalize(), "kiwify", &label, query.workspace).await
}

async fn hotmart_webhook(
    State(state): State<SharedState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    Json(payload): Json<HotmartEvent>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, &query)?;
    let label = payload.event.clone();
    process_vendor(&state, payload.normalize(), "hotmart", &label, query.workspace).await
}

/// Direct capture for landing pages and forms; no vendor envelope, just
/// the contact fields.
async fn lead_capture(
    State(state): State<SharedState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    Json(req): Json<LeadCaptureRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, &query)?;
    let vendor = req
        .source
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Vendor::Direct);
    let sale = NormalizedSale {
        vendor,
        kind: SaleEventKind::LeadCapture,
        transaction_id: None,
        customer: CustomerInfo {
            name: non_empty(req.name),
            email: non_empty(req.email),
            phone_raw: req.phone,
            document: None,
        },
        product: non_empty(req.product).map(|name| ProductInfo {
            external_id: None,
            name,
        }),
        payment: PaymentInfo::default(),
        occurred_at: None,
    };
    let hint = req.workspace_id.or(query.workspace);
    let outcome = state.pipeline.process(sale, hint).await?;
    Ok(Json(WebhookResponse::from(outcome)).into_response())
}

// ── Tests ─────────────────────────────────────────────────────────────
