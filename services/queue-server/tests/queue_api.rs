//! End-to-end API tests over a live listener, backed by the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use tokenq_fairness::{FairnessPolicy, ServingDeadline};
use tokenq_server::{
    api,
    notify::Notifier,
    queue::Scheduler,
    state::AppState,
    store::{MemoryStore, QueueStore},
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Captures notifications instead of sending them.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, destination: &str, message: &str) -> bool {
        self.sent
            .lock()
            .await
            .push((destination.to_string(), message.to_string()));
        true
    }
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = Arc::new(Scheduler::new(
        store.clone() as Arc<dyn QueueStore>,
        FairnessPolicy::new(3),
        ServingDeadline::from_secs(600),
    ));
    let state = AppState::new(
        store.clone() as Arc<dyn QueueStore>,
        scheduler,
        notifier.clone() as Arc<dyn Notifier>,
        2,
    );
    let app = api::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        store,
        notifier,
    }
}

impl TestApp {
    async fn issue_token(&self, name: &str, phone: Option<&str>) -> serde_json::Value {
        let resp = self
            .client
            .post(format!("{}/v1/tokens", self.base_url))
            .json(&serde_json::json!({ "customer_name": name, "phone_number": phone }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    async fn create_counter(&self, name: &str) -> i64 {
        let resp = self
            .client
            .post(format!("{}/v1/counters", self.base_url))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    async fn assign(&self, counter_id: i64) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/counters/{counter_id}/assign", self.base_url))
            .send()
            .await
            .unwrap()
    }

    async fn complete(&self, token_number: i64) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/v1/tokens/{token_number}/complete",
                self.base_url
            ))
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn issue_assign_complete_round_trip() {
    let app = spawn_app().await;

    let counter_id = app.create_counter("Counter 1").await;
    let issued = app.issue_token("Asha", Some("9876543210")).await;
    assert_eq!(issued["token"]["token_number"], 1);
    assert_eq!(issued["token"]["state"], "waiting");
    assert_eq!(issued["tokens_ahead"], 0);
    assert_eq!(issued["est_wait_minutes"], 2);

    // Manual assignment puts the token on the counter.
    let resp = app.assign(counter_id).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["assigned"]["token_number"], 1);
    assert_eq!(body["assigned"]["state"], "serving");
    assert_eq!(body["assigned"]["assigned_counter"], counter_id);

    let counter = app.store.counter(counter_id).await.unwrap().unwrap();
    assert!(!counter.is_available);
    assert_eq!(counter.current_token, Some(1));

    // Completion frees the counter again.
    let resp = app.complete(1).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "completed");

    let counter = app.store.counter(counter_id).await.unwrap().unwrap();
    assert!(counter.is_available);
    assert_eq!(counter.current_token, None);
    assert!(counter.last_completed_at.is_some());

    // Confirmation, assignment, and collection SMS were all dispatched.
    let sent = app.notifier.sent.lock().await;
    assert_eq!(sent.len(), 3);
    assert!(sent[0].1.contains("token #1 is confirmed"));
    assert!(sent[1].1.contains("now being served at counter Counter 1"));
    assert!(sent[2].1.contains("served and collected"));
}

#[tokio::test]
async fn assigning_a_busy_counter_is_a_conflict() {
    let app = spawn_app().await;

    let counter_id = app.create_counter("Counter 1").await;
    app.issue_token("Asha", None).await;
    app.issue_token("Bilal", None).await;

    assert_eq!(app.assign(counter_id).await.status(), 200);

    let resp = app.assign(counter_id).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(
        resp.headers()["content-type"],
        "application/problem+json"
    );
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "counter_unavailable");
}

#[tokio::test]
async fn assign_with_empty_queue_returns_null() {
    let app = spawn_app().await;
    let counter_id = app.create_counter("Counter 1").await;

    let resp = app.assign(counter_id).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["assigned"].is_null());
}

#[tokio::test]
async fn completing_twice_is_a_conflict() {
    let app = spawn_app().await;
    app.issue_token("Asha", None).await;

    assert_eq!(app.complete(1).await.status(), 200);

    let resp = app.complete(1).await;
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "already_completed");
}

#[tokio::test]
async fn unknown_token_status_is_not_found() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/v1/tokens/42", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "token_not_found");
}

#[tokio::test]
async fn status_reports_queue_position() {
    let app = spawn_app().await;
    app.issue_token("Asha", None).await;
    app.issue_token("Bilal", None).await;
    app.issue_token("Chitra", None).await;

    let resp = app
        .client
        .get(format!("{}/v1/tokens/3", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["current_serving"], 1);
    assert_eq!(body["tokens_ahead"], 2);
    assert_eq!(body["est_wait_minutes"], 6);
}

#[tokio::test]
async fn listing_filters_active_and_served() {
    let app = spawn_app().await;
    app.issue_token("Asha", None).await;
    app.issue_token("Bilal", None).await;
    app.complete(1).await;

    let active: serde_json::Value = app
        .client
        .get(format!("{}/v1/tokens?state=active", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let numbers: Vec<i64> = active["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["token_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![2]);

    let served: serde_json::Value = app
        .client
        .get(format!("{}/v1/tokens?state=served", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(served["items"].as_array().unwrap().len(), 1);

    let resp = app
        .client
        .get(format!("{}/v1/tokens?state=bogus", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn reset_restarts_token_numbering() {
    let app = spawn_app().await;
    app.issue_token("Asha", None).await;
    app.issue_token("Bilal", None).await;

    let resp = app
        .client
        .post(format!("{}/v1/queue/reset", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let issued = app.issue_token("Chitra", None).await;
    assert_eq!(issued["token"]["token_number"], 1);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/healthz", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "queue-server");
}
