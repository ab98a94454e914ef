//! Forum writes. Saving a discussion or comment indexes its mentions.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use threadline_core::{CategoryId, DiscussionId};

use crate::app::{dto, errors, services::AppServices};

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    match services.create_user(&body.name).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::UserResponse::from(user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_discussion(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateDiscussionRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let category_id = match body.category_id.map(CategoryId::new).transpose() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match services.create_discussion(category_id, body.body).await {
        Ok(d) => (StatusCode::CREATED, Json(dto::DiscussionResponse::from(d))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_comment(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateCommentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let discussion_id = match DiscussionId::new(body.discussion_id) {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match services.create_comment(discussion_id, body.body).await {
        Ok(c) => (StatusCode::CREATED, Json(dto::CommentResponse::from(c))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
