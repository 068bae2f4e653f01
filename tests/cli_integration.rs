use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cassist_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cassist");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/assistant.sqlite"

[openai]
api_key_env = "CASSIST_TEST_MISSING_KEY"
"#,
        root.display()
    );

    let config_path = config_dir.join("cassist.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cassist(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(cassist_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("CASSIST_TEST_MISSING_KEY")
        .output()
        .expect("failed to run cassist");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, success) = run_cassist(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data").join("assistant.sqlite").exists());

    // Idempotent
    let (_, stderr, success) = run_cassist(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_empty_listings() {
    let (_tmp, config) = setup_test_env();
    run_cassist(&config, &["init"]);

    let (stdout, _, success) = run_cassist(&config, &["profile", "list"]);
    assert!(success);
    assert!(stdout.contains("No profiles stored."));

    let (stdout, _, success) = run_cassist(&config, &["context", "list"]);
    assert!(success);
    assert!(stdout.contains("No contexts stored."));
}

#[test]
fn test_reset_requires_confirmation() {
    let (_tmp, config) = setup_test_env();
    run_cassist(&config, &["init"]);

    let (_, stderr, success) = run_cassist(&config, &["reset"]);
    assert!(!success);
    assert!(stderr.contains("--yes"));

    let (stdout, stderr, success) = run_cassist(&config, &["reset", "--yes"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("Database reset."));
}

#[test]
fn test_profile_lifecycle() {
    let (_tmp, config) = setup_test_env();
    run_cassist(&config, &["init"]);

    let (stdout, stderr, success) = run_cassist(
        &config,
        &[
            "profile",
            "create",
            "BuddBot",
            "--model",
            "gpt-4-turbo",
            "--initial-role",
            "You are a curtain wall expert.",
        ],
    );
    assert!(success, "create failed: {}", stderr);
    assert!(stdout.contains("Created profile 'BuddBot'"));

    let (stdout, _, _) = run_cassist(&config, &["profile", "list"]);
    assert!(stdout.contains("BuddBot"));
    assert!(stdout.contains("gpt-4-turbo"));

    let (stdout, _, success) = run_cassist(&config, &["profile", "show", "BuddBot"]);
    assert!(success);
    assert!(stdout.contains("You are a curtain wall expert."));
    assert!(stdout.contains("(none)"));

    // Duplicate names are rejected.
    let (_, stderr, success) = run_cassist(
        &config,
        &["profile", "create", "BuddBot", "--model", "m", "--initial-role", "r"],
    );
    assert!(!success);
    assert!(stderr.contains("already exists"), "stderr: {}", stderr);

    let (stdout, _, success) = run_cassist(&config, &["profile", "delete", "BuddBot"]);
    assert!(success);
    assert!(stdout.contains("Deleted profile 'BuddBot'"));

    let (_, _, success) = run_cassist(&config, &["profile", "show", "BuddBot"]);
    assert!(!success);
}

#[test]
fn test_profile_create_with_unknown_context_fails() {
    let (_tmp, config) = setup_test_env();
    run_cassist(&config, &["init"]);

    let (_, stderr, success) = run_cassist(
        &config,
        &[
            "profile",
            "create",
            "Bot",
            "--model",
            "m",
            "--initial-role",
            "r",
            "--context",
            "missing",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("no context named: missing"));

    let (stdout, _, _) = run_cassist(&config, &["profile", "list"]);
    assert!(stdout.contains("No profiles stored."));
}

#[test]
fn test_missing_context_and_document_errors() {
    let (tmp, config) = setup_test_env();
    run_cassist(&config, &["init"]);

    let (_, stderr, success) = run_cassist(&config, &["context", "show", "nope"]);
    assert!(!success);
    assert!(stderr.contains("no context named: nope"));

    let (_, stderr, success) = run_cassist(&config, &["context", "delete", "nope"]);
    assert!(!success);
    assert!(stderr.contains("no context named: nope"));

    let missing = tmp.path().join("nope.docx");
    let (_, stderr, success) =
        run_cassist(&config, &["context", "add", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("document not found"));
}

#[test]
fn test_ask_errors() {
    let (_tmp, config) = setup_test_env();
    run_cassist(&config, &["init"]);

    let (_, stderr, success) = run_cassist(&config, &["ask", "Nobody", "hello"]);
    assert!(!success);
    assert!(stderr.contains("no profile named: Nobody"));

    let (_, stderr, success) = run_cassist(&config, &["ask", "Nobody", "  "]);
    assert!(!success);
    assert!(stderr.contains("message must not be empty"));

    run_cassist(
        &config,
        &["profile", "create", "Bot", "--model", "m", "--initial-role", "r"],
    );
    let (_, stderr, success) = run_cassist(&config, &["ask", "Bot", "hello"]);
    assert!(!success);
    assert!(stderr.contains("CASSIST_TEST_MISSING_KEY environment variable not set"));
}

#[test]
fn test_bootstrap_without_profiles() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, success) = run_cassist(&config, &["bootstrap"]);
    assert!(success, "bootstrap failed: {}", stderr);
    assert!(stdout.contains("nothing to bootstrap"));
}

#[test]
fn test_completions_need_no_config() {
    let missing = PathBuf::from("/nonexistent/cassist.toml");
    let (stdout, _, success) = run_cassist(&missing, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("cassist"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[db]\npath = \"x.sqlite\"\n[retrieval]\ntop_k = 0\n").unwrap();

    let (_, stderr, success) = run_cassist(&config, &["init"]);
    assert!(!success);
    assert!(stderr.contains("top_k"));
}
