//! End-to-end tests for the HTTP API.
//!
//! The server runs in-process on a free port, backed by a temporary SQLite
//! database and deterministic keyword embedder / echo generator, so no
//! network providers are involved.

use async_trait::async_trait;
use knowledge_assistant::auth::{AuthSettings, Claims};
use knowledge_assistant::config::Config;
use knowledge_assistant::server::{self, AppState};
use knowledge_assistant::sqlite_store::SqliteStore;
use knowledge_assistant::{db, migrate};
use knowledge_assistant_core::assistant::{NO_DOCUMENTS_MESSAGE, NO_SUITABLE_DOCUMENT_MESSAGE};
use knowledge_assistant_core::embedding::Embedder;
use knowledge_assistant_core::generation::AnswerGenerator;
use knowledge_assistant_core::{EmbeddingError, GenerationError, KnowledgeAssistant};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

// ─── Test providers ─────────────────────────────────────────────────

const TOPICS: [&str; 3] = ["cat", "dog", "fish"];

/// One dimension per topic keyword: 1.0 if the text mentions it.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }
    fn dims(&self) -> usize {
        TOPICS.len()
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lower = text.to_lowercase();
        Ok(TOPICS
            .iter()
            .map(|t| if lower.contains(t) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Returns the user prompt, so tests can see which document was chosen.
struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        Ok(user_prompt.to_string())
    }
}

// ─── Harness ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir) -> Config {
    let config_content = format!(
        r#"
[db]
path = "{}"
"#,
        tmp.path().join("ka.sqlite").display()
    );
    toml::from_str(&config_content).unwrap()
}

async fn wait_for_server(base: &str) {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Start a server and return its base URL. The `TempDir` must outlive it.
async fn spawn_server() -> (TempDir, String) {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);

    let pool = db::connect(&cfg).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    let assistant = KnowledgeAssistant::new(
        Arc::new(KeywordEmbedder),
        Arc::new(SqliteStore::new(pool.clone(), "keyword-test")),
        Arc::new(EchoGenerator),
        cfg.retrieval.policy(),
    );
    let state = AppState::new(
        Arc::new(assistant),
        pool,
        AuthSettings::new("test-secret", 60, 4),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let _ = server::serve(listener, state).await;
    });
    wait_for_server(&base).await;
    (tmp, base)
}

async fn register_and_login(client: &reqwest::Client, base: &str, user: &str) -> String {
    let resp = client
        .post(format!("{}/auth/register", base))
        .json(&json!({"username": user, "password": "s3cret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/auth/login", base))
        .json(&json!({"username": user, "password": "s3cret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_and_health() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "Welcome to the Knowledge Assistant API!");

    let body: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

fn assert_bearer_challenge(resp: &reqwest::Response) {
    assert_eq!(resp.status(), 401);
    assert_eq!(
        resp.headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
}

/// A correctly signed token whose `exp` is an hour in the past.
fn expired_token(user: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user.to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_protected_routes_reject_missing_or_bad_token() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/knowledge/upload", base))
        .json(&json!({"content": "Cats are small domesticated felines."}))
        .send()
        .await
        .unwrap();
    assert_bearer_challenge(&resp);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");

    let resp = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth("not-a-token")
        .json(&json!({"question": "cats?"}))
        .send()
        .await
        .unwrap();
    assert_bearer_challenge(&resp);

    let resp = client
        .get(format!("{}/knowledge/documents", base))
        .send()
        .await
        .unwrap();
    assert_bearer_challenge(&resp);

    let resp = client
        .get(format!("{}/knowledge/documents", base))
        .header("Authorization", "Basic YWxpY2U6cHc=")
        .send()
        .await
        .unwrap();
    assert_bearer_challenge(&resp);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();
    register_and_login(&client, &base, "dave").await;

    let resp = client
        .get(format!("{}/knowledge/documents", base))
        .bearer_auth(expired_token("dave"))
        .send()
        .await
        .unwrap();
    assert_bearer_challenge(&resp);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &base, "erin").await;

    let resp = client
        .get(format!("{}/knowledge/documents", base))
        .header("Authorization", format!("bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_malformed_bodies_use_error_envelope() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();

    // Missing field
    let resp = client
        .post(format!("{}/auth/register", base))
        .json(&json!({"username": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("password"));

    // Not JSON at all
    let resp = client
        .post(format!("{}/auth/login", base))
        .header("Content-Type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Form endpoint without a password
    let resp = client
        .post(format!("{}/auth/token", base))
        .form(&[("username", "a")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Protected route with the wrong field name
    let token = register_and_login(&client, &base, "frank").await;
    let resp = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth(&token)
        .json(&json!({"query": "cats?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_register_and_login_failures() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();
    register_and_login(&client, &base, "alice").await;

    // Duplicate username
    let resp = client
        .post(format!("{}/auth/register", base))
        .json(&json!({"username": "alice", "password": "other"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Username already exists");

    // Blank username
    let resp = client
        .post(format!("{}/auth/register", base))
        .json(&json!({"username": "   ", "password": "pw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Wrong password
    let resp = client
        .post(format!("{}/auth/login", base))
        .json(&json!({"username": "alice", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Invalid username or password.");

    // Form-encoded token endpoint
    let resp = client
        .post(format!("{}/auth/token", base))
        .form(&[("username", "alice"), ("password", "s3cret-pass")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn test_upload_and_ask_round_trip() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &base, "alice").await;

    // Empty store: soft answer, not an HTTP error
    let resp = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth(&token)
        .json(&json!({"question": "Do cats purr?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], NO_DOCUMENTS_MESSAGE);

    for content in [
        "Cats are small domesticated felines that purr when content.",
        "Dogs are loyal companions descended from wolves.",
    ] {
        let resp = client
            .post(format!("{}/knowledge/upload", base))
            .bearer_auth(&token)
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Document uploaded successfully!");
        assert!(body["id"].as_str().is_some());
    }

    // Best match is the cats document; the echo generator returns the prompt
    let body: Value = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth(&token)
        .json(&json!({"question": "Do cats purr?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.contains("Cats are small domesticated felines"));
    assert!(answer.contains("Question:\nDo cats purr?"));
    assert!(!answer.contains("Dogs"));

    // Nothing about fish: best score 0.0 is below the threshold
    let body: Value = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth(&token)
        .json(&json!({"question": "What do fish eat?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["answer"], NO_SUITABLE_DOCUMENT_MESSAGE);

    // Listing records the uploader as owner
    let body: Value = client
        .get(format!("{}/knowledge/documents", base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let docs = body.as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d["owner"] == "alice"));
    assert!(docs[0]["preview"].as_str().unwrap().starts_with("Cats"));
}

#[tokio::test]
async fn test_short_best_document_is_not_used() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &base, "bob").await;

    let resp = client
        .post(format!("{}/knowledge/upload", base))
        .bearer_auth(&token)
        .json(&json!({"content": "Dogs bark."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth(&token)
        .json(&json!({"question": "Why do dogs bark?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["answer"], NO_SUITABLE_DOCUMENT_MESSAGE);
}

#[tokio::test]
async fn test_empty_content_is_bad_request() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &base, "carol").await;

    let resp = client
        .post(format!("{}/knowledge/upload", base))
        .bearer_auth(&token)
        .json(&json!({"content": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/knowledge/ask-question", base))
        .bearer_auth(&token)
        .json(&json!({"question": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
