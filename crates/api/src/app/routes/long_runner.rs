//! Long-runner continuation: resumes any job from its callback payload.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use threadline_runner::{CheckpointToken, RunOutcome};

use crate::app::{dto, errors, services::AppServices};

/// Map a run outcome to the long-runner response: `complete_status` when
/// finished, `408` with a callback payload when more work remains.
pub fn run_response(outcome: RunOutcome, complete_status: StatusCode) -> axum::response::Response {
    let status = if outcome.is_complete() {
        complete_status
    } else {
        StatusCode::REQUEST_TIMEOUT
    };
    (status, Json(dto::RunResponse::from(outcome))).into_response()
}

pub async fn resume(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::ResumeRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let token = CheckpointToken::from(body.callback_payload);
    match services.resume(&token, body.max_iterations).await {
        Ok(outcome) => run_response(outcome, StatusCode::OK),
        Err(e) => errors::service_error_to_response(e),
    }
}
