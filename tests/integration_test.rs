//! End-to-end CLI scenarios, driven against the built `memory-bank`
//! binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bin() -> Command {
    Command::cargo_bin("memory-bank").expect("binary should build")
}

fn root_arg(tmp: &TempDir) -> String {
    tmp.path().join(".memory-bank").to_string_lossy().to_string()
}

fn write_transcript(tmp: &TempDir, name: &str, lines: &[&str]) -> String {
    let path = tmp.path().join(name);
    fs::write(&path, lines.join("\n")).expect("write transcript");
    path.to_string_lossy().to_string()
}

#[test]
fn init_creates_a_store_and_sessions_reports_empty() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);

    bin()
        .args(["--root", &root, "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));

    assert!(tmp.path().join(".memory-bank").join("config.json").exists());

    bin()
        .args(["--root", &root, "sessions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no sessions"));
}

#[test]
fn init_twice_without_force_fails() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);

    bin().args(["--root", &root, "init"]).assert().success();
    bin()
        .args(["--root", &root, "init"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn commands_before_init_fail_with_code_one() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);

    bin()
        .args(["--root", &root, "sessions"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn import_extracts_turns_and_chunks_them() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    let transcript = write_transcript(
        &tmp,
        "session.jsonl",
        &[
            r#"{"role":"user","content":"how do I add a login form","timestamp":1000}"#,
            r#"{"role":"assistant","content":"use a controlled component with useState","timestamp":1010}"#,
            r#"{"type":"tool_use","role":"assistant","content":"ignored","timestamp":1015}"#,
        ],
    );

    bin()
        .args(["--root", &root, "import", &transcript])
        .assert()
        .success()
        .stdout(predicate::str::contains("chunks"));

    bin()
        .args(["--root", &root, "sessions", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source\": \"import\""));
}

#[test]
fn import_of_malformed_transcript_fails() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    let transcript = write_transcript(&tmp, "bad.jsonl", &["not json at all"]);

    bin()
        .args(["--root", &root, "import", &transcript])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn delete_removes_a_session() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    let transcript = write_transcript(
        &tmp,
        "session.jsonl",
        &[r#"{"role":"user","content":"hello there","timestamp":1000}"#],
    );
    let output = bin()
        .args(["--root", &root, "import", &transcript])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let id = stdout
        .split_whitespace()
        .nth(2)
        .expect("import output names the session id")
        .trim_end_matches(':')
        .to_string();

    bin()
        .args(["--root", &root, "delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"));

    bin()
        .args(["--root", &root, "delete", &id])
        .assert()
        .failure();
}

#[test]
fn pack_with_one_session_and_no_artifacts_fits_small_budget() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    let transcript = write_transcript(
        &tmp,
        "session.jsonl",
        &[
            r#"{"role":"user","content":"let's refactor the parser module","timestamp":2000}"#,
            r#"{"role":"assistant","content":"sure, I'll split it into a lexer and a parser file","timestamp":2010}"#,
        ],
    );
    bin()
        .args(["--root", &root, "import", &transcript])
        .assert()
        .success();

    bin()
        .args([
            "--root",
            &root,
            "pack",
            "--mode",
            "auto",
            "--budget",
            "500",
            "--pack-format",
            "xml",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("<project-state>")
                .and(predicate::str::contains("<instructions>"))
                .and(predicate::str::contains("<active-tasks>").not())
                .and(predicate::str::contains("<plans>").not()),
        );
}

#[test]
fn search_with_unknown_source_type_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    bin()
        .args([
            "--root",
            &root,
            "search",
            "anything",
            "--source-type",
            "bogus",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn run_and_graph_and_hooks_are_not_implemented() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    bin()
        .args(["--root", &root, "run", "--", "echo", "hi"])
        .assert()
        .failure()
        .code(1);

    bin().args(["--root", &root, "graph"]).assert().failure().code(1);

    bin()
        .args(["--root", &root, "hooks", "status"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn projects_lists_nothing_before_any_import() {
    bin()
        .args(["projects", "--root", "/tmp/does-not-matter-for-projects"])
        .assert()
        .success();
}

#[test]
fn reindex_rebuilds_an_empty_index() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    bin()
        .args(["--root", &root, "reindex"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reindexed"));
}

#[test]
fn migrate_reports_current_version() {
    let tmp = TempDir::new().unwrap();
    let root = root_arg(&tmp);
    bin().args(["--root", &root, "init"]).assert().success();

    bin()
        .args(["--root", &root, "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrated"));
}
