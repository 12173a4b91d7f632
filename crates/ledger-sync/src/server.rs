//! The `changeSets` HTTP endpoint other instances synchronize from.
//!
//! `GET /changeSets?skipUntil=<hash>&since=<rfc3339>&skip=<n>&take=<n>`
//! answers with the JSON array of matching envelopes.  The checkpoint to
//! poll with next time is sent as the `ETag`, the unfiltered ledger size as
//! `X-Total-Count`.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header::ETAG, HeaderName, HeaderValue, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ledger_contracts::{
    error::{LedgerError, LedgerResult},
    query::ChangeSetQuery,
};
use ledger_log::Ledger;

/// Header carrying the unfiltered record count.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetParams {
    pub skip_until: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
}

impl From<ChangeSetParams> for ChangeSetQuery {
    fn from(params: ChangeSetParams) -> Self {
        ChangeSetQuery {
            since: params.since,
            skip_until_hash: params.skip_until.filter(|h| !h.is_empty()),
            predicate: None,
            skip: params.skip,
            take: params.take,
        }
    }
}

/// `LedgerError` as an HTTP response.
pub struct ApiError(LedgerError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError(e)
    }
}

#[derive(Clone)]
struct ApiKeyGuard {
    header: HeaderName,
    key: Arc<str>,
}

async fn require_api_key(
    State(guard): State<ApiKeyGuard>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(&guard.header)
        .and_then(|val| val.to_str().ok());
    if provided == Some(&*guard.key) {
        return Ok(next.run(req).await);
    }
    warn!(header = %guard.header, "rejecting changeSets request without a valid API key");
    Err(StatusCode::UNAUTHORIZED)
}

async fn change_sets(
    State(ledger): State<Ledger>,
    Query(params): Query<ChangeSetParams>,
) -> Result<Response, ApiError> {
    let page = ledger.load_change_sets(&params.into()).await?;

    let mut response = Json(page.records).into_response();
    let headers = response.headers_mut();
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", page.checkpoint)) {
        headers.insert(ETAG, etag);
    }
    headers.insert(
        HeaderName::from_static(TOTAL_COUNT_HEADER),
        HeaderValue::from(page.total_count),
    );
    Ok(response)
}

/// Router serving `/changeSets` from `ledger`.
///
/// When the ledger's `server.api_key` is set, requests must present it in
/// the `sync.api_key_header` header.
///
/// # Errors
///
/// `ConfigError` when the API key header name is not a valid header name.
pub fn build_router(ledger: Ledger) -> LedgerResult<Router> {
    let api_key = ledger.config().server.api_key.clone();
    let header_name = ledger.config().sync.api_key_header.clone();

    let router = Router::new()
        .route("/changeSets", get(change_sets))
        .with_state(ledger);

    match api_key {
        Some(key) => {
            let header = HeaderName::try_from(header_name.as_str()).map_err(|e| {
                LedgerError::ConfigError {
                    reason: format!("invalid api_key_header '{}': {}", header_name, e),
                }
            })?;
            let guard = ApiKeyGuard {
                header,
                key: Arc::from(key.as_str()),
            };
            Ok(router.layer(from_fn_with_state(guard, require_api_key)))
        }
        None => Ok(router),
    }
}

/// Serve `/changeSets` on the configured address until `cancel` fires.
///
/// # Errors
///
/// `ConfigError` when the address cannot be bound, `ReadFailed` when the
/// server stops abnormally.
pub async fn serve(ledger: Ledger, cancel: CancellationToken) -> LedgerResult<()> {
    let addr = ledger.config().server.bind_addr;
    let router = build_router(ledger)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LedgerError::ConfigError {
            reason: format!("cannot bind {}: {}", addr, e),
        })?;

    info!(addr = %addr, "serving changeSets");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| LedgerError::ReadFailed {
            reason: format!("changeSets server stopped: {}", e),
        })
}
