//! Out-of-band denylist refresh

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use suggest_common::api::MessageResponse;
use suggest_common::transaction::{self, TRANSACTION_ID_HEADER};
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /__denylist/refresh
///
/// 200 with the new entry count, 503 when the source could not be read. A
/// failed refresh leaves the cached contents untouched.
pub async fn refresh_denylist(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<MessageResponse>> {
    let tid = transaction::from_header(
        headers
            .get(TRANSACTION_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );

    match state.denylist.refresh(&CancellationToken::new(), &tid).await {
        Ok(denylist) => Ok(Json(MessageResponse::new(format!(
            "Denylist refreshed with {} entries",
            denylist.len()
        )))),
        Err(e) => {
            tracing::error!(tid = %tid, error = %e, "Denylist refresh failed");
            Err(ApiError::ServiceUnavailable(e.to_string()))
        }
    }
}

/// Build denylist routes
pub fn denylist_routes() -> Router<AppState> {
    Router::new().route("/__denylist/refresh", post(refresh_denylist))
}
