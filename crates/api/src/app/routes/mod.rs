use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod forum;
pub mod long_runner;
pub mod system;
pub mod user_mentions;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/users", post(forum::create_user))
        .route("/discussions", post(forum::create_discussion))
        .route("/comments", post(forum::create_comment))
        .route("/user-mentions/indexer-start", post(user_mentions::indexer_start))
        .route("/user-mentions/users/:user_id", get(user_mentions::user_mentions))
        .route("/user-mentions", delete(user_mentions::reset))
        .route("/long-runner/resume", post(long_runner::resume))
}
