#![deny(unsafe_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_core::{
    CollectionConfig, IssuanceEvent, LedgerError, MintEngine, MintEngineConfig, MintReceipt,
    StorageConfig,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub collection: CollectionConfig,
    pub storage: StorageConfig,
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<MintEngine>,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let ServiceConfig {
            collection,
            storage,
        } = config;
        let engine =
            MintEngine::bootstrap(MintEngineConfig::new(collection).with_storage(storage))
                .await
                .map_err(ServiceError::Core)?;

        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/collection", get(collection))
        .route("/v1/supply", get(supply))
        .route("/v1/mint", post(mint))
        .route("/v1/tokens/:id/owner", get(token_owner))
        .route("/v1/tokens/:id/uri", get(token_uri))
        .route("/v1/holders/:holder/tokens", get(holder_tokens))
        .route("/v1/holders/:holder/balance", get(holder_balance))
        .route("/v1/events", get(events))
        .route("/v1/receipts", get(receipts))
        .route("/v1/treasury/withdraw", post(withdraw))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("core ledger error: {0}")]
    Core(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] LedgerError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn ledger_error_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::TooEarly { .. } | LedgerError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        LedgerError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientPayment { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::SupplyExceeded { .. } => StatusCode::CONFLICT,
        LedgerError::UnknownToken(_) => StatusCode::NOT_FOUND,
        LedgerError::Ledger(_) | LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
            ApiError::Core(err) => (
                ledger_error_status(&err),
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    ledger_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "tessera-service",
        ledger_backend: state.engine.backend_label().await,
    })
}

#[derive(Debug, Clone, Serialize)]
struct CollectionResponse {
    name: String,
    symbol: String,
    cost_per_unit: u64,
    max_supply: u64,
    allow_minting_on: u64,
    base_uri: String,
    authority: String,
}

async fn collection(State(state): State<ServiceState>) -> Json<CollectionResponse> {
    let config = state.engine.collection();
    Json(CollectionResponse {
        name: config.name.clone(),
        symbol: config.symbol.clone(),
        cost_per_unit: config.cost_per_unit,
        max_supply: config.max_supply,
        allow_minting_on: config.allow_minting_on,
        base_uri: config.base_uri.clone(),
        authority: config.authority.clone(),
    })
}

#[derive(Debug, Clone, Serialize)]
struct SupplyResponse {
    total_supply: u64,
    remaining_supply: u64,
    max_supply: u64,
    treasury_minor: u64,
}

async fn supply(State(state): State<ServiceState>) -> Json<SupplyResponse> {
    Json(SupplyResponse {
        total_supply: state.engine.total_supply().await,
        remaining_supply: state.engine.remaining_supply().await,
        max_supply: state.engine.collection().max_supply,
        treasury_minor: state.engine.treasury_minor().await,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct MintRequest {
    holder: String,
    quantity: u64,
    payment_minor: u64,
}

async fn mint(
    State(state): State<ServiceState>,
    Json(request): Json<MintRequest>,
) -> Result<Json<MintReceipt>, ApiError> {
    if request.holder.trim().is_empty() {
        return Err(ApiError::bad_request("holder is required"));
    }

    let receipt = state
        .engine
        .mint(&request.holder, request.quantity, request.payment_minor)
        .await?;

    info!(
        holder = %receipt.holder,
        quantity = receipt.quantity,
        last_token_id = receipt.last_token_id,
        "mint committed"
    );

    Ok(Json(receipt))
}

#[derive(Debug, Clone, Serialize)]
struct TokenOwnerResponse {
    token_id: u64,
    owner: String,
}

async fn token_owner(
    Path(token_id): Path<u64>,
    State(state): State<ServiceState>,
) -> Result<Json<TokenOwnerResponse>, ApiError> {
    let owner = state.engine.owner_of(token_id).await?;
    Ok(Json(TokenOwnerResponse { token_id, owner }))
}

#[derive(Debug, Clone, Serialize)]
struct TokenUriResponse {
    token_id: u64,
    uri: String,
}

async fn token_uri(
    Path(token_id): Path<u64>,
    State(state): State<ServiceState>,
) -> Result<Json<TokenUriResponse>, ApiError> {
    let uri = state.engine.token_uri(token_id).await?;
    Ok(Json(TokenUriResponse { token_id, uri }))
}

#[derive(Debug, Clone, Serialize)]
struct HolderTokensResponse {
    holder: String,
    tokens: Vec<u64>,
}

async fn holder_tokens(
    Path(holder): Path<String>,
    State(state): State<ServiceState>,
) -> Json<HolderTokensResponse> {
    let tokens = state.engine.tokens_of(&holder).await;
    Json(HolderTokensResponse { holder, tokens })
}

#[derive(Debug, Clone, Serialize)]
struct HolderBalanceResponse {
    holder: String,
    balance: u64,
}

async fn holder_balance(
    Path(holder): Path<String>,
    State(state): State<ServiceState>,
) -> Json<HolderBalanceResponse> {
    let balance = state.engine.balance_of(&holder).await;
    Json(HolderBalanceResponse { holder, balance })
}

#[derive(Debug, Clone, Serialize)]
struct EventsResponse {
    items: Vec<IssuanceEvent>,
}

async fn events(State(state): State<ServiceState>) -> Json<EventsResponse> {
    Json(EventsResponse {
        items: state.engine.events().await,
    })
}

#[derive(Debug, Clone, Serialize)]
struct ReceiptsResponse {
    items: Vec<MintReceipt>,
}

async fn receipts(State(state): State<ServiceState>) -> Json<ReceiptsResponse> {
    Json(ReceiptsResponse {
        items: state.engine.receipts().await,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct WithdrawRequest {
    caller: String,
}

#[derive(Debug, Clone, Serialize)]
struct WithdrawResponse {
    caller: String,
    amount_minor: u64,
}

async fn withdraw(
    State(state): State<ServiceState>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    if request.caller.trim().is_empty() {
        return Err(ApiError::bad_request("caller is required"));
    }

    let amount_minor = state.engine.withdraw(&request.caller).await?;

    info!(caller = %request.caller, amount_minor, "treasury withdrawn");

    Ok(Json(WithdrawResponse {
        caller: request.caller,
        amount_minor,
    }))
}
