use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use threadline_core::DomainError;
use threadline_mentions::MentionStoreError;
use threadline_runner::RunnerError;

use crate::app::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Runner(e) => runner_error_to_response(e),
        ServiceError::Store(e) => store_error_to_response(e),
    }
}

pub fn runner_error_to_response(err: RunnerError) -> axum::response::Response {
    match err {
        RunnerError::InvalidFilter(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_filter", msg),
        RunnerError::UnknownJob(kind) => json_error(
            StatusCode::BAD_REQUEST,
            "unknown_job",
            format!("unknown job kind `{kind}`"),
        ),
        RunnerError::CorruptCheckpoint(msg) => {
            json_error(StatusCode::BAD_REQUEST, "corrupt_checkpoint", msg)
        }
        e @ RunnerError::Source { .. } => {
            tracing::error!(error = %e, "record source failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "source_error", e.to_string())
        }
        RunnerError::Encode(msg) => {
            tracing::error!(error = %msg, "checkpoint encoding failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "encode_error", msg)
        }
    }
}

pub fn store_error_to_response(err: MentionStoreError) -> axum::response::Response {
    match err {
        MentionStoreError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        MentionStoreError::Domain(DomainError::InvalidId(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
        }
        MentionStoreError::Domain(DomainError::UnknownRecordType(kind)) => json_error(
            StatusCode::BAD_REQUEST,
            "unknown_record_type",
            format!("unknown record type `{kind}`"),
        ),
        MentionStoreError::Domain(DomainError::NotFound(what)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", what)
        }
        MentionStoreError::Domain(DomainError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        MentionStoreError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

/// Malformed or mistyped request bodies, in the same `{ error, message }` shape.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(rejection.status(), "invalid_body", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
