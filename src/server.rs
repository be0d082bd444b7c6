use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::farm::{
    AccountSummary, BlockInfo, Farm, FarmError, FarmStatus, FarmingSession, Ledger, LedgerHealth,
};
use crate::fetcher::{FetchError, Fetcher, Leaderboard, Quote};
use crate::tracing::prelude::*;

/// Largest `limit` accepted by `/api/holders`.
const MAX_HOLDERS: usize = 100;

/// Largest per-request override of the proof of work budget.
const MAX_WORK_ATTEMPTS: u64 = 10_000_000;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn farm_status_code(e: &FarmError) -> StatusCode {
    match e {
        FarmError::InvalidSecret | FarmError::InvalidStake(_) => StatusCode::BAD_REQUEST,
        FarmError::NotConnected | FarmError::UnknownAccount(_) => StatusCode::NOT_FOUND,
        FarmError::OutOfOrder { .. } => StatusCode::CONFLICT,
        FarmError::NoSolution { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FarmError::Ledger { .. } => StatusCode::BAD_GATEWAY,
        FarmError::Solver(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FarmError::Cycle { source, .. } => farm_status_code(source),
    }
}

fn farm_error(e: FarmError) -> ApiError {
    let status = farm_status_code(&e);
    if status.is_server_error() {
        error!(error = %e, "Farm request failed");
    }
    api_error(status, e)
}

fn fetch_error(e: FetchError) -> ApiError {
    error!(error = %e, "Fetch request failed");
    api_error(StatusCode::BAD_GATEWAY, e)
}

/// Shared state behind every route
pub struct AppState<L> {
    pub fetcher: Fetcher,
    pub farm: Farm<L>,
}

#[derive(Debug, Deserialize)]
pub struct HoldersQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub user_id: String,
    pub secret_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRequest {
    pub user_id: String,
    /// KALE.
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    pub user_id: String,
    pub max_attempts: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: String,
}

pub fn router<L: Ledger + 'static>(state: Arc<AppState<L>>) -> Router {
    Router::new()
        .route("/api/holders", get(handle_holders::<L>))
        .route("/api/price", get(handle_price::<L>))
        .route("/api/block_info", get(handle_block_info::<L>))
        .route("/api/health", get(handle_health::<L>))
        .route("/api/farm/connect", post(handle_connect::<L>))
        .route("/api/farm/plant", post(handle_plant::<L>))
        .route("/api/farm/work", post(handle_work::<L>))
        .route("/api/farm/harvest", post(handle_harvest::<L>))
        .route("/api/farm/cycle", post(handle_cycle::<L>))
        .route("/api/farm/status/:user_id", get(handle_status::<L>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until the process is stopped
pub async fn serve<L: Ledger + 'static>(addr: SocketAddr, state: Arc<AppState<L>>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn handle_holders<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Query(query): Query<HoldersQuery>,
) -> ApiResult<Leaderboard> {
    let limit = query.limit.unwrap_or_else(|| state.fetcher.default_limit());
    if limit == 0 || limit > MAX_HOLDERS {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {}", MAX_HOLDERS),
        ));
    }

    let board = state.fetcher.top_holders(limit).await.map_err(fetch_error)?;
    Ok(Json(board))
}

async fn handle_price<L: Ledger>(State(state): State<Arc<AppState<L>>>) -> ApiResult<Quote> {
    let quote = state.fetcher.price().await.map_err(fetch_error)?;
    Ok(Json(quote))
}

/// Current farm index and its entropy, if anyone has planted yet
async fn handle_block_info<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
) -> ApiResult<BlockInfo> {
    let info = state.farm.block_info().await.map_err(farm_error)?;
    Ok(Json(info))
}

async fn handle_health<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
) -> ApiResult<LedgerHealth> {
    let health = state.farm.health().await.map_err(farm_error)?;
    Ok(Json(health))
}

async fn handle_connect<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Json(payload): Json<ConnectRequest>,
) -> ApiResult<AccountSummary> {
    let account = state
        .farm
        .connect(&payload.user_id, &payload.secret_key)
        .await
        .map_err(farm_error)?;
    Ok(Json(account))
}

async fn handle_plant<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Json(payload): Json<StakeRequest>,
) -> ApiResult<FarmingSession> {
    let session = state
        .farm
        .plant(&payload.user_id, payload.amount)
        .await
        .map_err(farm_error)?;
    Ok(Json(session))
}

async fn handle_work<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Json(payload): Json<WorkRequest>,
) -> ApiResult<FarmingSession> {
    if payload.max_attempts.is_some_and(|n| n > MAX_WORK_ATTEMPTS) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("maxAttempts must be at most {}", MAX_WORK_ATTEMPTS),
        ));
    }

    let session = state
        .farm
        .work(&payload.user_id, payload.max_attempts)
        .await
        .map_err(farm_error)?;
    Ok(Json(session))
}

async fn handle_harvest<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Json(payload): Json<UserRequest>,
) -> ApiResult<FarmingSession> {
    let session = state
        .farm
        .harvest(&payload.user_id)
        .await
        .map_err(farm_error)?;
    Ok(Json(session))
}

/// Runs plant, work and harvest back to back; the response waits for all three
async fn handle_cycle<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Json(payload): Json<StakeRequest>,
) -> ApiResult<FarmingSession> {
    let session = state
        .farm
        .run_cycle(&payload.user_id, payload.amount)
        .await
        .map_err(farm_error)?;
    Ok(Json(session))
}

async fn handle_status<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    Path(user_id): Path<String>,
) -> Json<FarmStatus> {
    Json(state.farm.status(&user_id).await)
}
