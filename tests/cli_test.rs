use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const SECRET: &str = "cli-test-secret";

fn paypoll() -> Command {
    let mut cmd = Command::new(cargo_bin!());
    cmd.env("PAYPOLL_SECRET", SECRET).env_remove("RUST_LOG");
    cmd
}

fn issue(subject: &str, role: &str) -> String {
    let output = paypoll()
        .args(["token", "--subject", subject, "--role", role])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[test]
fn test_token_and_whoami() {
    paypoll()
        .args(["token", "--subject", "pos-1", "--role", "pos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ttlSeconds\":300"))
        .stdout(predicate::str::contains("\"roleSource\":\"explicit\""));

    let token = issue("pos-1", "pos");
    paypoll()
        .args(["whoami", "--token", &token])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"role\":\"pos\""))
        .stdout(predicate::str::contains("\"sub\":\"pos-1\""));
}

#[test]
fn test_invalid_role() {
    paypoll()
        .args(["token", "--subject", "alice", "--role", "admin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"InvalidRole\""));
}

#[test]
fn test_token_from_other_secret_is_invalid() {
    let token = issue("pos-1", "pos");
    paypoll()
        .env("PAYPOLL_SECRET", "different")
        .args(["pending", "--token", &token])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"TokenInvalid\""));
}

#[test]
fn test_create_reports_totals() {
    let token = issue("alice", "client");
    paypoll()
        .args([
            "create",
            "--token",
            &token,
            "--source",
            "alice",
            "--destination",
            "coffee-shop",
            "--amount",
            "1000",
            "--buyer-float-percent",
            "2.5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"grandTotal\":\"1040.00\""))
        .stdout(predicate::str::contains("\"status\":\"WAITING\""))
        .stdout(predicate::str::contains("\"txToken\""));
}

#[test]
fn test_create_uses_preview_base() {
    let token = issue("alice", "client");
    paypoll()
        .args([
            "create",
            "--token",
            &token,
            "--source",
            "alice",
            "--destination",
            "shop",
            "--amount",
            "10",
            "--preview-base",
            "https://img.example/p",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imageRef\":\"https://img.example/p?tx="));
}

#[test]
fn test_create_rejects_bad_amount() {
    let token = issue("alice", "client");
    paypoll()
        .args([
            "create",
            "--token",
            &token,
            "--source",
            "alice",
            "--destination",
            "shop",
            "--amount",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"ValidationError\""));
}

#[test]
fn test_status_unknown_transaction() {
    let token = issue("pos-1", "pos");
    paypoll()
        .args(["status", "6f1c5b0e-2a3d-4c4e-9f7a-1b2c3d4e5f60", "--token", &token])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"NotFound\""));
}

#[test]
fn test_pending_requires_pos() {
    let token = issue("alice", "client");
    paypoll()
        .args(["pending", "--token", &token])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"Unauthorized\""));
}

#[test]
fn test_zero_poll_interval_rejected() {
    paypoll()
        .args(["demo", "--interval-ms", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval-ms"));
}

#[test]
fn test_blank_role_is_inferred() {
    paypoll()
        .args(["token", "--subject", "pos-terminal-2", "--role", ""])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"role\":\"pos\""))
        .stdout(predicate::str::contains("\"roleSource\":\"inferred\""));
}

#[test]
fn test_demo_runs_to_settlement() {
    paypoll()
        .args(["demo", "--interval-ms", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"finalStatus\":\"SETTLED\""))
        .stdout(predicate::str::contains("\"grandTotal\":\"1040.00\""));
}
