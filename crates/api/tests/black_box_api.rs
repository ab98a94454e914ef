use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use threadline_api::app::{router, AppServices};
use threadline_runner::RunnerConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory stores, bound to an ephemeral port.
        let services = Arc::new(AppServices::in_memory(
            RunnerConfig::default().with_page_size(2),
        ));
        let app = router(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A user mentioned by two discussions and two comments. Returns the user id.
async fn seed_forum(srv: &TestServer) -> i64 {
    let (status, user) = srv.post("/users", json!({ "name": "mentioned" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = user["userID"].as_i64().unwrap();

    let (status, d1) = srv
        .post("/discussions", json!({ "body": "hello @\"mentioned\"" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let d1 = d1["discussionID"].as_i64().unwrap();

    let (status, _) = srv
        .post("/discussions", json!({ "body": "@mentioned again", "categoryID": 3 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    for body in ["@mentioned first", "@mentioned second"] {
        let (status, _) = srv
            .post("/comments", json!({ "discussionID": d1, "body": body }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    user_id
}

async fn mentions_of(srv: &TestServer, user_id: i64) -> Vec<Value> {
    let (status, body) = srv.get(&format!("/user-mentions/users/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().unwrap().clone()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn saving_records_indexes_mentions() {
    let srv = TestServer::spawn().await;
    let user_id = seed_forum(&srv).await;

    let rows = mentions_of(&srv, user_id).await;
    assert_eq!(rows.len(), 4);

    let first = &rows[0];
    assert_eq!(first["userID"], user_id);
    assert_eq!(first["recordType"], "discussion");
    assert_eq!(first["mentionedName"], "mentioned");
    assert_eq!(first["parentRecordType"], "category");
    assert_eq!(first["parentRecordID"], -1);
    assert_eq!(first["status"], "active");
    assert!(first["dateInserted"].is_string());
}

#[tokio::test]
async fn indexer_start_rebuilds_the_index() {
    let srv = TestServer::spawn().await;
    let user_id = seed_forum(&srv).await;

    let (status, reset) = srv.delete("/user-mentions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["removed"], 4);
    assert!(mentions_of(&srv, user_id).await.is_empty());

    let (status, body) = srv
        .post("/user-mentions/indexer-start", json!({ "recordType": "all" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "complete");
    assert_eq!(body["summary"]["processed"], 4);
    assert!(body.get("callbackPayload").is_none());

    assert_eq!(mentions_of(&srv, user_id).await.len(), 4);
}

#[tokio::test]
async fn long_runner_continues_from_callback_payload() {
    let srv = TestServer::spawn().await;
    let user_id = seed_forum(&srv).await;
    srv.delete("/user-mentions").await;

    let (status, body) = srv
        .post(
            "/user-mentions/indexer-start",
            json!({ "recordType": "all", "maxIterations": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["status"], "incomplete");
    assert_eq!(body["summary"]["processed"], 1);
    assert_eq!(body["remaining"], 3);
    let payload = body["callbackPayload"].as_str().unwrap().to_string();
    assert_eq!(mentions_of(&srv, user_id).await.len(), 1);

    let (status, body) = srv
        .post("/long-runner/resume", json!({ "callbackPayload": payload }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "complete");
    assert_eq!(body["summary"]["processed"], 4);
    assert!(body.get("remaining").is_none());
    assert_eq!(mentions_of(&srv, user_id).await.len(), 4);
}

#[tokio::test]
async fn zero_budget_hands_back_the_same_payload() {
    let srv = TestServer::spawn().await;
    seed_forum(&srv).await;

    let (status, started) = srv
        .post(
            "/user-mentions/indexer-start",
            json!({ "recordType": "comment", "maxIterations": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(started["summary"]["processed"], 0);
    let payload = started["callbackPayload"].as_str().unwrap().to_string();

    let (status, resumed) = srv
        .post(
            "/long-runner/resume",
            json!({ "callbackPayload": payload, "maxIterations": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(resumed["callbackPayload"], payload.as_str());
}

#[tokio::test]
async fn unknown_record_type_is_rejected() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post("/user-mentions/indexer-start", json!({ "recordType": "poll" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_filter");
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post("/long-runner/resume", json!({ "callbackPayload": "v1.e30.0000000000000000" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "corrupt_checkpoint");
}

#[tokio::test]
async fn forum_write_errors_map_to_status_codes() {
    let srv = TestServer::spawn().await;
    srv.post("/users", json!({ "name": "alice" })).await;

    let (status, body) = srv.post("/users", json!({ "name": "ALICE" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = srv
        .post("/comments", json!({ "discussionID": 99, "body": "@alice" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = srv.get("/user-mentions/users/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post(
            "/user-mentions/indexer-start",
            json!({ "recordType": "all", "maxIterations": -1 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].is_string());

    let res = srv
        .client
        .post(format!("{}/long-runner/resume", srv.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");
}
