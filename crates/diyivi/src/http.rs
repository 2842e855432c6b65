//! Axum HTTP handlers for the DIYivi server.
//!
//! Routes mirror the two protocols: `/exchanges/...` and `/signatures/...`,
//! plus `/health`. Failures are returned as `{"detail": ...}` with 404 for
//! anything the caller may not see, 400 for rejected input and 500 for
//! store or internal failures.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use diyivi_core::{ExchangeId, SignatureRequestId};
use diyivi_exchange::{
    CreateExchange, CreateSignatureRequest, CreatedExchange, CreatedSignatureRequest,
    ExchangeInfo, ExchangeResponse, ExchangeResult, ProtocolError, SignatureRequestInfo,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::{AppState, Backend};

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let exchanges = Router::new()
        .route("/create/", post(create_exchange))
        .route("/{exchange_id}/start/", post(start_exchange))
        .route("/{exchange_id}/", get(exchange_info))
        .route("/{exchange_id}/respond/", post(respond_exchange))
        .route("/{exchange_id}/result/", get(exchange_result));

    let signatures = Router::new()
        .route("/create/", post(create_signature_request))
        .route("/{request_id}/start/", post(start_signature_request))
        .route("/{request_id}/", get(signature_request_info))
        .route("/{request_id}/respond/", post(submit_signature));

    Router::new()
        .route("/health", get(handle_health))
        .nest("/exchanges", exchanges)
        .nest("/signatures", signatures)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

pub struct ApiError(ProtocolError);

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match &self.0 {
            ProtocolError::NotFound => (StatusCode::NOT_FOUND, "Not found".into()),
            ProtocolError::Unauthorized => {
                (StatusCode::BAD_REQUEST, "Incorrect initiator secret".into())
            }
            ProtocolError::AlreadyStarted => (StatusCode::BAD_REQUEST, "Already started".into()),
            ProtocolError::InvalidToken(_) => (StatusCode::BAD_REQUEST, "Invalid JWT".into()),
            ProtocolError::InvalidResult(_) | ProtocolError::PolicyNotSatisfied => {
                (StatusCode::BAD_REQUEST, "Invalid session result".into())
            }
            ProtocolError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ProtocolError::Storage(_) | ProtocolError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".into(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StartExchangeBody {
    initiator_secret: String,
    disclosure_result: String,
}

#[derive(Deserialize)]
struct DisclosureBody {
    disclosure_result: String,
}

#[derive(Deserialize)]
struct SignatureBody {
    signature_result: String,
}

#[derive(Deserialize)]
struct SecretQuery {
    secret: String,
}

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

/// POST /exchanges/create/
async fn create_exchange(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateExchange>,
) -> ApiResult<Json<CreatedExchange>> {
    Ok(Json(state.exchanges.create(request)?))
}

/// POST /exchanges/{id}/start/
async fn start_exchange(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    Json(body): Json<StartExchangeBody>,
) -> ApiResult<StatusCode> {
    state.exchanges.start(
        &ExchangeId::new(exchange_id),
        &body.initiator_secret,
        &body.disclosure_result,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /exchanges/{id}/
async fn exchange_info(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
) -> ApiResult<Json<ExchangeInfo>> {
    Ok(Json(state.exchanges.get_info(&ExchangeId::new(exchange_id))?))
}

/// POST /exchanges/{id}/respond/
async fn respond_exchange(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    Json(body): Json<DisclosureBody>,
) -> ApiResult<Json<ExchangeResponse>> {
    Ok(Json(state.exchanges.respond(
        &ExchangeId::new(exchange_id),
        &body.disclosure_result,
    )?))
}

/// GET /exchanges/{id}/result/?secret=
async fn exchange_result(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    Query(query): Query<SecretQuery>,
) -> ApiResult<Json<ExchangeResult>> {
    Ok(Json(state.exchanges.get_result(
        &ExchangeId::new(exchange_id),
        &query.secret,
    )?))
}

// ---------------------------------------------------------------------------
// Signature requests
// ---------------------------------------------------------------------------

/// POST /signatures/create/
async fn create_signature_request(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSignatureRequest>,
) -> ApiResult<Json<CreatedSignatureRequest>> {
    Ok(Json(state.signatures.create(request)?))
}

/// POST /signatures/{id}/start/
async fn start_signature_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Json(body): Json<DisclosureBody>,
) -> ApiResult<StatusCode> {
    state
        .signatures
        .start(&SignatureRequestId::new(request_id), &body.disclosure_result)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /signatures/{id}/
async fn signature_request_info(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<SignatureRequestInfo>> {
    Ok(Json(
        state
            .signatures
            .get_info(&SignatureRequestId::new(request_id))?,
    ))
}

/// POST /signatures/{id}/respond/
async fn submit_signature(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Json(body): Json<SignatureBody>,
) -> ApiResult<StatusCode> {
    state
        .signatures
        .submit_signature(&SignatureRequestId::new(request_id), &body.signature_result)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = match &state.backend {
        Backend::Memory(_) => "memory",
        #[cfg(feature = "sqlite")]
        Backend::Sqlite(_) => "sqlite",
    };
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store,
    }))
}
