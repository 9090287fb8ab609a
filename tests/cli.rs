use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn file(name: &str) -> Value {
    json!({
        "fileId": format!("id-{name}"),
        "name": name,
        "open": format!("https://drive.example/{name}/open"),
        "view": format!("https://drive.example/{name}/view"),
        "preview": format!("https://drive.example/{name}/preview"),
        "thumb": format!("https://drive.example/{name}/thumb"),
    })
}

/// Isolated working dir with an empty config file.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_envelope(&self, name: &str, envelope: &Value) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, serde_json::to_string(envelope).unwrap()).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lotview"));
        cmd.current_dir(self.dir.path())
            .env_remove("LOTVIEW_ENDPOINT")
            .env_remove("LOTVIEW_TIMEOUT_MS")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }
}

#[test]
fn render_json_reports_files_and_active_item() {
    let ws = Workspace::new();
    let envelope = ws.write_envelope(
        "found.json",
        &json!({
            "ok": true,
            "count": 2,
            "items": [file("a.jpg"), file("b.pdf")],
            "primary": file("b.pdf"),
        }),
    );

    let output = ws
        .cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", " A1 ", "--json"])
        .assert()
        .success()
        .get_output()
        .clone();
    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json report");

    assert_eq!(report["result"]["disposition"], "found");
    assert_eq!(report["result"]["count"], 2);
    assert_eq!(report["status"]["text"], "Found 2 file(s)");
    assert_eq!(report["status"]["is_error"], false);
    assert_eq!(report["address"], "http://localhost:8080/?lot=A1");
    assert_eq!(report["active"], "b.pdf");
    assert_eq!(report["files"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["files"][0]["fileId"], "id-a.jpg");
}

#[test]
fn render_select_switches_active_item() {
    let ws = Workspace::new();
    let envelope = ws.write_envelope(
        "found.json",
        &json!({"ok": true, "items": [file("a.jpg"), file("b.pdf")]}),
    );

    ws.cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", "A1", "--select", "b.pdf", "--json"])
        .assert()
        .success()
        .stdout(contains("\"active\": \"b.pdf\""));

    ws.cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", "A1", "--select", "zzz.jpg"])
        .assert()
        .failure()
        .stderr(contains("no file named"));
}

#[test]
fn render_writes_html_document() {
    let ws = Workspace::new();
    let envelope = ws.write_envelope(
        "found.json",
        &json!({"ok": true, "count": 1, "items": [file("<b>.jpg")]}),
    );
    let html = ws.path("page.html");

    ws.cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", "A1", "--html"])
        .arg(&html)
        .assert()
        .success()
        .stdout(contains("Found 1 file(s)"));

    let page = fs::read_to_string(&html).unwrap();
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<title>LOT A1</title>"));
    assert!(page.contains("&lt;b&gt;.jpg"));
    assert!(!page.contains("<b>.jpg"));
    assert!(page.contains("class=\"detail-image\""));
}

#[test]
fn render_not_found_prints_error_status() {
    let ws = Workspace::new();
    let envelope = ws.write_envelope("missing.json", &json!({"ok": false, "notFound": true}));

    ws.cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", "Z9"])
        .assert()
        .success()
        .stdout(contains("Not found"))
        .stdout(contains("Not found for LOT Z9."));
}

#[test]
fn render_rejects_non_object_envelope() {
    let ws = Workspace::new();
    let envelope = ws.write_envelope("bad.json", &json!([1, 2, 3]));

    ws.cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", "A1"])
        .assert()
        .failure()
        .stderr(contains("expected a JSON object"));
}

#[test]
fn blank_lot_is_rejected() {
    let ws = Workspace::new();
    let envelope = ws.write_envelope("found.json", &json!({"ok": true, "items": []}));

    ws.cmd()
        .arg("render")
        .arg(&envelope)
        .args(["--lot", "   "])
        .assert()
        .failure()
        .stderr(contains("LOT must not be empty"));
}

#[test]
fn lookup_without_endpoint_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["lookup", "A1"])
        .assert()
        .failure()
        .stderr(contains("no lookup endpoint configured"));
}

#[test]
fn invalid_endpoint_flag_is_reported() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["--endpoint", "not a url", "lookup", "A1"])
        .assert()
        .failure()
        .stderr(contains("invalid endpoint URL"));
}

#[test]
fn completions_and_man_are_generated() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("lotview").and(contains("render")));

    ws.cmd()
        .arg("man")
        .assert()
        .success()
        .stdout(contains(".TH"));
}
