//! End-to-end tests for the `docqa` binary.
//!
//! None of these reach a model provider.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::Workspace;
use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    let ws = Workspace::new();
    ws.docqa()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("collections"))
        .stdout(predicate::str::contains("init-prompts"));
}

#[test]
fn empty_store_has_no_collections() {
    let ws = Workspace::new();
    ws.docqa()
        .args(["collections", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No collections loaded."));
}

#[test]
fn load_then_list() {
    let ws = Workspace::new();
    let guide = ws.write(
        "install.md",
        "# Installing\n\nRun the installer and follow the prompts.\n",
    );
    let api = ws.write(
        "api.jsonl",
        concat!(
            r#"{"id": "a1", "content": "The client exposes a retry option.", "metadata": {"source": "api.md"}}"#,
            "\n",
            r#"{"id": "a2", "page_content": "Timeouts are set in seconds."}"#,
            "\n",
        ),
    );

    ws.docqa()
        .args(["collections", "load", "guides"])
        .arg(&guide)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created collection 'guides'"));

    ws.docqa()
        .args(["collections", "load", "api"])
        .arg(&api)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 2 new chunk(s)"));

    ws.docqa()
        .args(["collections", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("guides"))
        .stdout(predicate::str::contains("api"));
}

#[test]
fn reloading_skips_known_documents() {
    let ws = Workspace::new();
    let api = ws.write(
        "api.json",
        r#"[{"id": "a1", "content": "Retries are off by default."}]"#,
    );

    ws.docqa()
        .args(["collections", "load", "api"])
        .arg(&api)
        .assert()
        .success();

    ws.docqa()
        .args(["collections", "load", "api"])
        .arg(&api)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 0 new chunk(s)"))
        .stdout(predicate::str::contains("1 already present"));
}

#[test]
fn json_collection_list() {
    let ws = Workspace::new();
    let doc = ws.write("faq.txt", "Questions and answers.");
    ws.docqa()
        .args(["collections", "load", "faq"])
        .arg(&doc)
        .assert()
        .success();

    let output = ws
        .docqa()
        .args(["--format", "json", "collections", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let collections = value.as_array().unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0]["name"], "faq");
    assert_eq!(collections[0]["document_count"], 1);
}

#[test]
fn load_rejects_missing_file() {
    let ws = Workspace::new();
    ws.docqa()
        .args(["collections", "load", "api"])
        .arg(ws.path().join("missing.md"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_prompts_writes_templates() {
    let ws = Workspace::new();
    let dir = ws.path().join("prompts");

    ws.docqa()
        .arg("init-prompts")
        .arg("--dir")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 prompt template(s)"));
    assert!(std::fs::read_dir(&dir).unwrap().count() >= 4);

    ws.docqa()
        .arg("init-prompts")
        .arg("--dir")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}

#[test]
fn ask_without_api_key_fails() {
    let ws = Workspace::new();
    ws.docqa()
        .args(["ask", "How do I install it?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn ask_rejects_empty_question() {
    let ws = Workspace::new();
    ws.docqa()
        .args(["ask", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("question cannot be empty"));
}

#[test]
fn forced_category_needs_justification() {
    let ws = Workspace::new();
    ws.docqa()
        .args(["ask", "hi", "--category", "related"])
        .assert()
        .failure();
}
