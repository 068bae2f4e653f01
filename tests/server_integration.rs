//! HTTP server tests with in-process fake collaborators.
//!
//! The embedder maps text to a keyword vector and the completer records
//! every conversation it is sent, so tests can assert on exactly what the
//! chat model saw.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use context_assistant::config::Config;
use context_assistant::server::run_server_with_collaborators;
use context_assistant::sqlite_store::SqliteContextStore;
use context_assistant_core::capability::{ChatCompleter, Embedder};
use context_assistant_core::context::Context;
use context_assistant_core::models::{chunks_from_pairs, ChatMessage, Role};
use context_assistant_core::profile::AssistantProfile;
use context_assistant_core::store::ContextStore;
use tempfile::TempDir;

// ─── Fakes ──────────────────────────────────────────────────────────

const KEYWORDS: [&str; 3] = ["mullion", "sealant", "anchor"];

struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect())
    }
}

#[derive(Default)]
struct RecordingCompleter {
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatCompleter for RecordingCompleter {
    async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        if last.contains("FAIL") {
            bail!("upstream exploded");
        }
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(ChatMessage::assistant(format!("reply #{}", self.calls.lock().unwrap().len())))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(root: &std::path::Path, port: u16) -> Config {
    toml::from_str(&format!(
        r#"[db]
path = "{}/data/assistant.sqlite"

[retrieval]
top_k = 1

[server]
bind = "127.0.0.1:{}"
"#,
        root.display(),
        port
    ))
    .unwrap()
}

async fn seed_profile(cfg: &Config) {
    let store = SqliteContextStore::open(cfg).await.unwrap();
    let manual = Context::with_chunks(
        "curtainwall101",
        "docs/curtainwall101.docx",
        "text-embedding-3-small",
        chunks_from_pairs(vec![
            ("A mullion is a vertical framing member.", vec![1.0, 0.0, 0.0]),
            ("Sealant keeps water out of the joints.", vec![0.0, 1.0, 0.0]),
            ("Anchors tie the wall to the slab.", vec![0.0, 0.0, 1.0]),
        ]),
    )
    .unwrap();
    let mut profile = AssistantProfile::new(
        "BuddBot",
        "gpt-4-turbo",
        "text-embedding-3-small",
        "You are a curtain wall expert.",
        "Answer briefly.",
    );
    profile.add_context(manual).unwrap();
    store.write_assistant_profile(&mut profile).await.unwrap();
    store.close().await;
}

async fn start_server(tmp: &TempDir) -> (u16, Arc<RecordingCompleter>) {
    let port = find_free_port();
    let cfg = test_config(tmp.path(), port);
    seed_profile(&cfg).await;

    let completer = Arc::new(RecordingCompleter::default());
    let completer_clone = completer.clone();
    tokio::spawn(async move {
        run_server_with_collaborators(&cfg, Arc::new(KeywordEmbedder), completer_clone)
            .await
            .ok();
    });
    wait_for_server(port).await;
    (port, completer)
}

async fn post_query(port: u16, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/query", port))
        .json(&body)
        .send()
        .await
        .unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_profile_list() {
    let tmp = TempDir::new().unwrap();
    let (port, _) = start_server(&tmp).await;

    let health: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/health", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let profiles: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/profiles", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        profiles,
        serde_json::json!([{ "name": "BuddBot", "model": "gpt-4-turbo" }])
    );
}

#[tokio::test]
async fn test_augmented_query_keeps_raw_question_in_history() {
    let tmp = TempDir::new().unwrap();
    let (port, completer) = start_server(&tmp).await;

    let resp = post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "What is a mullion?" }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["profile"], "BuddBot");
    assert_eq!(body["message"], "reply #1");

    let resp = post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "How is sealant applied?" }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let calls = completer.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);

    // First call: system prompt plus the augmented question.
    let first = &calls[0];
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].role, Role::System);
    assert_eq!(first[0].content, "You are a curtain wall expert.");
    assert!(first[1].content.contains("Answer briefly."));
    assert!(first[1].content.contains("[context: curtainwall101]"));
    assert!(first[1].content.contains("A mullion is a vertical framing member."));
    assert!(!first[1].content.contains("Sealant keeps water"));

    // Second call: the transcript holds the raw first question, not its prompt.
    let second = &calls[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[1], ChatMessage::user("What is a mullion?"));
    assert_eq!(second[2], ChatMessage::assistant("reply #1"));
    assert!(second[3].content.contains("Sealant keeps water out of the joints."));
}

#[tokio::test]
async fn test_plain_query_skips_retrieval() {
    let tmp = TempDir::new().unwrap();
    let (port, completer) = start_server(&tmp).await;

    let resp = post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "Hello", "augment": false }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let calls = completer.calls.lock().unwrap().clone();
    assert_eq!(calls[0][1], ChatMessage::user("Answer briefly.\nHello"));
}

#[tokio::test]
async fn test_unknown_profile_is_404() {
    let tmp = TempDir::new().unwrap();
    let (port, _) = start_server(&tmp).await;

    let resp = post_query(
        port,
        serde_json::json!({ "profile": "Nobody", "message": "hi" }),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_empty_message_is_400() {
    let tmp = TempDir::new().unwrap();
    let (port, completer) = start_server(&tmp).await;

    let resp = post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "   " }),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(completer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_is_502_and_history_unchanged() {
    let tmp = TempDir::new().unwrap();
    let (port, completer) = start_server(&tmp).await;

    let resp = post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "FAIL please" }),
    )
    .await;
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "upstream_error");

    post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "Anchor spacing?" }),
    )
    .await;
    let calls = completer.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2, "failed turn must not be recorded");
}

#[tokio::test]
async fn test_reset_clears_history() {
    let tmp = TempDir::new().unwrap();
    let (port, completer) = start_server(&tmp).await;

    post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "What is a mullion?" }),
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/profiles/BuddBot/reset", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["history_len"], 1);

    post_query(
        port,
        serde_json::json!({ "profile": "BuddBot", "message": "Anchor spacing?" }),
    )
    .await;
    let calls = completer.calls.lock().unwrap().clone();
    assert_eq!(calls[1].len(), 2);

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/profiles/Nobody/reset", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
