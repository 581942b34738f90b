//! Per-chain data and broadcast endpoints.

use std::future::Future;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use vaultgate_base::GatewayError;
use vaultgate_core::{amount::CONFIG_MISSING, BalanceResult, UpstreamError};

use super::{error_response, redact_sensitive, AppState};

/// Deadline for read operations, broadcast runs longer.
const READ_DEADLINE: Duration = Duration::from_secs(30);
const BROADCAST_DEADLINE: Duration = Duration::from_secs(120);

/// Run a routed call under a deadline; expiry cancels admission waits and
/// backoff sleeps by dropping the future.
async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Upstream(UpstreamError::Cancelled)),
    }
}

fn bad_chain() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "detail": "Unsupported chain" })),
    )
        .into_response()
}

fn is_logical(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Upstream(UpstreamError::Logical(_)))
}

#[derive(Deserialize)]
pub(super) struct ContractQuery {
    contract: Option<String>,
}

/// `GET /balance/{chain}/{address}?contract=`.
pub(super) async fn get_balance(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
    Query(query): Query<ContractQuery>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let contract = query.contract.as_deref();
    let mut body = Map::new();
    body.insert("chain".into(), json!(chain));
    body.insert("address".into(), json!(address));
    body.insert("contract".into(), json!(contract));

    let result = with_deadline(
        READ_DEADLINE,
        state.chains.balance(&chain, &address, contract),
    )
    .await;
    match result {
        Ok(BalanceResult::Amount(amount)) => {
            body.insert("balance".into(), json!(amount));
            Json(Value::Object(body)).into_response()
        }
        Ok(BalanceResult::Record(record)) => {
            body.extend(record);
            Json(Value::Object(body)).into_response()
        }
        Err(err) if is_logical(&err) => {
            body.insert("balance".into(), json!(CONFIG_MISSING));
            Json(Value::Object(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `GET /accountResource/{chain}/{address}?contract=`.
pub(super) async fn get_account_resource(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
    Query(query): Query<ContractQuery>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(
        READ_DEADLINE,
        state
            .chains
            .account_resource(&chain, &address, query.contract.as_deref()),
    )
    .await;
    match result {
        Ok(mut record) => {
            // fee constants every chain's client expects alongside the
            // resource record
            record.insert("feeBandwidth".into(), json!(0.001));
            record.insert("feeEnergy".into(), json!(0.00021));
            record.insert("feeActivation".into(), json!(1));
            record.insert("feeEnergyNeeded".into(), json!(65000));
            Json(Value::Object(record)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
pub(super) struct HistoryQuery {
    contract: Option<String>,
    limit: Option<usize>,
}

/// `GET /transaction/{chain}/{address}?contract=&limit=` — newest first.
pub(super) async fn get_transactions(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let limit = query.limit.unwrap_or(10).clamp(1, 50);
    let result = with_deadline(
        READ_DEADLINE,
        state
            .chains
            .transactions(&chain, &address, query.contract.as_deref(), limit),
    )
    .await;
    match result {
        Ok(transfers) => Json(transfers).into_response(),
        Err(err) if is_logical(&err) => Json(json!([])).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
pub(super) struct UtxoQuery {
    total_value: Option<String>,
}

/// `GET /utxo/{chain}/{address}?total_value=`.
pub(super) async fn get_utxos(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
    Query(query): Query<UtxoQuery>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let total_value = query.total_value.as_deref().unwrap_or("0.00000001");
    let result = with_deadline(
        READ_DEADLINE,
        state.chains.utxos(&chain, &address, total_value),
    )
    .await;
    match result {
        Ok(utxos) => Json(utxos).into_response(),
        Err(err) if is_logical(&err) => Json(json!([])).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /block/{chain}/{address}` — 502 when the upstream had nothing.
pub(super) async fn get_block(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(READ_DEADLINE, state.chains.latest_block(&chain, &address)).await;
    match result {
        Ok(block) if !block.is_empty() => Json(Value::Object(block)).into_response(),
        Ok(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "detail": "Upstream error" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /fee/{chain}`.
pub(super) async fn get_fee(
    State(state): State<AppState>,
    Path(chain): Path<String>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(READ_DEADLINE, state.chains.fee(&chain)).await;
    match result {
        Ok(quote) => Json(quote).into_response(),
        // chains without a fee market answer with an empty record
        Err(err) if is_logical(&err) => Json(json!({})).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /nonce/{chain}/{address}`.
pub(super) async fn get_nonce(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(READ_DEADLINE, state.chains.nonce(&chain, &address)).await;
    match result {
        Ok(nonce) => Json(json!(nonce)).into_response(),
        Err(err) if is_logical(&err) => Json(json!(0)).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /estimateGas/{chain}/{address}?contract=`.
pub(super) async fn estimate_gas(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
    Query(query): Query<ContractQuery>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(
        READ_DEADLINE,
        state
            .chains
            .estimate_gas(&chain, &address, query.contract.as_deref()),
    )
    .await;
    match result {
        Ok(estimate) => Json(estimate).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /seqno/{chain}/{address}` — TON only; an active wallet with an
/// unreadable seqno is an error, never zero.
pub(super) async fn get_seqno(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(READ_DEADLINE, state.chains.seqno(&chain, &address)).await;
    match result {
        Ok(info) => Json(info).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /tx/{chain}/{tx_id}` — details or 404.
pub(super) async fn get_transaction(
    State(state): State<AppState>,
    Path((chain, tx_id)): Path<(String, String)>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    let result = with_deadline(READ_DEADLINE, state.chains.transaction(&chain, &tx_id)).await;
    match result {
        Ok(tx) => Json(tx).into_response(),
        // chains with no detail source have no record to offer
        Err(GatewayError::Unsupported) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Transaction not found" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /broadcast/{chain}` with `{"tx_hex": ...}`.
pub(super) async fn broadcast(
    State(state): State<AppState>,
    Path(chain): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !state.registry.is_served(&chain) {
        return bad_chain();
    }
    debug!(chain, body = %redact_sensitive(&body), "broadcast request");
    let Some(payload) = body.get("tx_hex").filter(|v| !v.is_null()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Missing tx_hex" })),
        )
            .into_response();
    };
    if payload.as_str().is_some_and(|s| s.trim().is_empty()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Missing tx_hex" })),
        )
            .into_response();
    }

    let result = with_deadline(
        BROADCAST_DEADLINE,
        state.chains.broadcast(&chain, payload),
    )
    .await;
    match result {
        Ok(txid) if !txid.is_empty() => {
            Json(json!({ "success": true, "txid": txid })).into_response()
        }
        Ok(_) => broadcast_failure(),
        Err(GatewayError::Unsupported) => bad_chain(),
        Err(GatewayError::Upstream(err)) => {
            // never relay the upstream error body to the caller
            debug!(chain, error = %err, "broadcast rejected");
            broadcast_failure()
        }
    }
}

fn broadcast_failure() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "detail": "Broadcast failed" })),
    )
        .into_response()
}
