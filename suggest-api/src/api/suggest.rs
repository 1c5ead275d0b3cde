//! Suggestions endpoint

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{Map, Value};
use suggest_common::transaction::{self, TRANSACTION_ID_HEADER};
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::services::provider::DEBUG_HEADER;
use crate::types::{RequestContext, SourceFlags, SuggestionsResponse};
use crate::AppState;

/// Query parameter selecting suggestion sources
pub const SOURCES_PARAM: &str = "sources";

/// POST /content/suggest
///
/// Body is the content JSON (`byline`, `bodyXML`, `title`). The transaction id
/// is taken from `X-Request-Id` (generated when absent) and echoed back.
pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tid = transaction::from_header(header_str(&headers, TRANSACTION_ID_HEADER));

    let mut response = handle(&state, &params, &headers, &body, &tid).await.into_response();
    if let Ok(value) = HeaderValue::from_str(&tid) {
        response.headers_mut().insert(TRANSACTION_ID_HEADER, value);
    }
    response
}

async fn handle(
    state: &AppState,
    params: &[(String, String)],
    headers: &HeaderMap,
    body: &[u8],
    tid: &str,
) -> ApiResult<Json<SuggestionsResponse>> {
    validate_payload(body).map_err(|e| {
        tracing::error!(tid = %tid, error = %e, "Client error: payload should be a non-empty JSON object");
        e
    })?;

    let debug = header_str(headers, DEBUG_HEADER)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let sources = params
        .iter()
        .filter(|(key, _)| key == SOURCES_PARAM)
        .map(|(_, value)| value.as_str());
    let flags = SourceFlags::parse(sources, debug).map_err(|e| {
        tracing::error!(tid = %tid, error = %e, "Client error: sources incorrectly set");
        ApiError::BadRequest(e.to_string())
    })?;

    // Dropped when the client goes away, which cancels every outbound call
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let ctx = RequestContext::new(tid, flags).with_cancel(cancel);

    let suggestions = state.aggregator.get_suggestions(body, &ctx).await?;
    if suggestions.suggestions.is_empty() {
        tracing::warn!(tid = %tid, "Suggestions are empty");
    }
    Ok(Json(suggestions))
}

/// Payload must be a JSON object with at least one member
fn validate_payload(body: &[u8]) -> ApiResult<()> {
    match serde_json::from_slice::<Map<String, Value>>(body) {
        Ok(object) if !object.is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest(
            "Payload should be a non-empty JSON object".to_string(),
        )),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Build suggestion routes
pub fn suggest_routes() -> Router<AppState> {
    Router::new().route("/content/suggest", post(suggest))
}
