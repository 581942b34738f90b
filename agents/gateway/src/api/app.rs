//! Application-level endpoints: config, prices, version, docs, metrics.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::AppState;

/// `GET /config/tokens` — served chains and the token whitelist.
pub(super) async fn get_config(State(state): State<AppState>) -> Response {
    let coins: Vec<&str> = state
        .registry
        .coins()
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    Json(json!({
        "coins": coins,
        "tokens": state.registry.tokens(),
    }))
    .into_response()
}

#[derive(Deserialize)]
pub(super) struct PricesQuery {
    coins: String,
}

/// `GET /prices?coins=BTC,ETH` — cache, then tier fan-out.
pub(super) async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Response {
    let symbols: Vec<String> = query
        .coins
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    let report = state.prices.fetch(&symbols).await;
    Json(json!({
        "code": 200,
        "data": report.data,
        "failed": report.failed,
    }))
    .into_response()
}

/// `GET /version` — companion-app update descriptor.
pub(super) async fn get_version() -> Response {
    Json(json!({
        "code": 200,
        "data": {
            "version": "1.0.0",
            "note": "Fixed known bugs and improved security stability.",
            "android_url": "https://www.vaultgate.app/release/app-v1.0.1.apk",
            "ios_url": "https://apps.apple.com/app/id123456789",
        },
    }))
    .into_response()
}

#[derive(Deserialize)]
pub(super) struct DocQuery {
    lang: Option<String>,
}

const DOC_TITLES: &[(&str, &str, &str)] = &[
    ("security", "Vaultgate 安全交互规范", "Vaultgate Security Interaction Specs"),
    ("privacy", "Vaultgate 隐私政策", "Vaultgate Privacy Policy"),
    ("terms", "Vaultgate 服务条款", "Vaultgate Terms of Service"),
];

/// `GET /docs/{type}?lang=zh|en` — localized policy document. The body is
/// served as raw Markdown; rendering belongs to the client.
pub(super) async fn get_doc(
    State(state): State<AppState>,
    Path(doc_type): Path<String>,
    Query(query): Query<DocQuery>,
) -> Response {
    let Some((_, title_zh, title_en)) = DOC_TITLES.iter().find(|(t, _, _)| *t == doc_type)
    else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Document type not found" })),
        )
            .into_response();
    };

    let lang = query.lang.unwrap_or_else(|| "zh".to_owned());
    let mut effective_lang = lang.clone();
    let mut path = state.docs_dir.join(format!("{doc_type}_{lang}.md"));
    if !path.exists() {
        effective_lang = "zh".to_owned();
        path = state.docs_dir.join(format!("{doc_type}_zh.md"));
    }

    let body = match tokio::fs::read_to_string(&path).await {
        Ok(body) => body,
        Err(err) => {
            error!(path = %path.display(), error = %err, "policy document missing");
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Document file not found" })),
            )
                .into_response();
        }
    };

    let title = if effective_lang == "zh" { title_zh } else { title_en };
    Json(json!({ "title": title, "data": body })).into_response()
}

/// `GET /metrics` — Prometheus text exposition.
pub(super) async fn get_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.gather() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
