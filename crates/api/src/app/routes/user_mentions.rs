use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use threadline_core::UserId;
use threadline_runner::RecordFilter;

use crate::app::routes::long_runner::run_response;
use crate::app::{dto, errors, services::AppServices};

/// POST /user-mentions/indexer-start
pub async fn indexer_start(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::IndexerStartRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let filter = RecordFilter::parse(&body.record_type);
    match services.start_reindex(filter, body.max_iterations).await {
        Ok(outcome) => run_response(outcome, StatusCode::CREATED),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /user-mentions/users/:user_id
pub async fn user_mentions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id = match user_id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match services.active_mentions(user_id).await {
        Ok(rows) => Json(
            rows.into_iter()
                .map(dto::UserMentionResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /user-mentions
pub async fn reset(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.reset_mentions().await {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
