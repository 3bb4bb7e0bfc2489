//! End-to-end tests for the `draftpages` binary.

use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn draftpages(db: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("draftpages"));
    cmd.env_remove("DRAFTPAGES_CONFIG").arg("--db").arg(db);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn put_region_creates_a_draft_that_commit_publishes() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pages.sqlite3");

    let put = draftpages(&db)
        .args(["--actor", "ed", "--role", "editor"])
        .args(["put-region", "promo:body", r#"{"type":"text","content":"Spring sale"}"#])
        .output()
        .unwrap();
    assert!(put.status.success());
    let written = stdout_json(&put);
    assert_eq!(written["slug"], "promo");
    let page_id = written["created_page"].as_str().unwrap().to_string();

    let listed = draftpages(&db)
        .args(["--role", "admin", "list-drafts", "--sort", "author", "--order", "asc"])
        .output()
        .unwrap();
    assert!(listed.status.success());
    let listing = stdout_json(&listed);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["pages"][0]["slug"], "promo");
    assert_eq!(listing["pages"][0]["draft_regions"][0], "body");

    draftpages(&db)
        .args(["--actor", "boss", "--role", "admin", "commit", &page_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"));

    let after = draftpages(&db)
        .args(["--role", "admin", "list-drafts"])
        .output()
        .unwrap();
    assert_eq!(stdout_json(&after)["total"], 0);

    let query = draftpages(&db)
        .args(["--role", "admin", "query", "--canonical-only"])
        .output()
        .unwrap();
    assert!(query.status.success());
    let results = stdout_json(&query);
    assert_eq!(results["pages"][0]["areas"]["body"]["content"], "Spring sale");
}

#[test]
fn contributor_cannot_commit() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pages.sqlite3");

    let put = draftpages(&db)
        .args(["--role", "editor", "put-region", "faq:main", r#"{"content":"Q"}"#])
        .output()
        .unwrap();
    let page_id = stdout_json(&put)["created_page"]
        .as_str()
        .unwrap()
        .to_string();

    draftpages(&db)
        .args(["--role", "contributor", "commit", &page_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("status 500"));
}

#[test]
fn malformed_region_key_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pages.sqlite3");

    draftpages(&db)
        .args(["put-region", "badslug:", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn unknown_role_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pages.sqlite3");

    draftpages(&db)
        .args(["--role", "root", "list-drafts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown role"));
}

#[test]
fn config_file_supplies_database_path() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("from-config.sqlite3");
    let config = dir.path().join("draftpages.toml");
    std::fs::write(
        &config,
        format!("database_path = {:?}\nlist_drafts_limit = 5\n", db.to_str().unwrap()),
    )
    .unwrap();

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("draftpages"))
        .arg("--config")
        .arg(&config)
        .arg("list-drafts")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
    assert!(db.is_file());
}

#[test]
fn commands_run_as_guest_by_default() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pages.sqlite3");

    draftpages(&db)
        .args(["put-region", "promo:body", r#"{"content":"x"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("permission"));
}

#[test]
fn distinct_lists_field_values_and_tags() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pages.sqlite3");

    draftpages(&db)
        .args(["--actor", "amy", "--role", "editor", "put-region", "faq:main", "{}"])
        .assert()
        .success();

    let authors = draftpages(&db)
        .args(["--role", "admin", "distinct", "last_edit_author"])
        .output()
        .unwrap();
    assert!(authors.status.success());
    assert_eq!(stdout_json(&authors), serde_json::json!(["amy"]));

    let tags = draftpages(&db)
        .args(["--role", "admin", "distinct", "tags"])
        .output()
        .unwrap();
    assert_eq!(stdout_json(&tags), serde_json::json!([]));

    draftpages(&db)
        .args(["distinct", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown page field"));
}
