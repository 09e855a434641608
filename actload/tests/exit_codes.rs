use std::process::{Command, Output};

use actload_testserver::{EndpointBehavior, Reply, TestServer, TestServerOptions};
use anyhow::Context as _;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

async fn short_run(base_url: String, export: std::path::PathBuf) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_actload");
    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--stage")
            .arg("0s:1")
            .arg("--stage")
            .arg("1s:1")
            .arg("--think-time")
            .arg("10ms")
            .arg("--summary-export")
            .arg(&export)
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run actload binary")
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_actload"))
        .arg("run")
        .arg("--timeout")
        .arg("10x")
        .output()
        .context("run actload binary")?;

    ensure_code(&out, 30)
}

#[test]
fn unsupported_profile_extension_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let profile = dir.path().join("profile.json");
    std::fs::write(&profile, "{}")?;

    let out = Command::new(env!("CARGO_BIN_EXE_actload"))
        .arg("run")
        .arg(&profile)
        .arg("--no-summary-export")
        .output()
        .context("run actload binary")?;

    ensure_code(&out, 30)
}

#[test]
fn invalid_threshold_in_profile_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let profile = dir.path().join("profile.yaml");
    std::fs::write(&profile, "thresholds:\n  errors: rate<<0.1\n")?;

    let out = Command::new(env!("CARGO_BIN_EXE_actload"))
        .arg("run")
        .arg(&profile)
        .arg("--no-summary-export")
        .output()
        .context("run actload binary")?;

    ensure_code(&out, 30)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn healthy_run_exits_0_and_exports_results() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let export = dir.path().join("nested/results.json");

    let out = short_run(server.base_url().to_string(), export.clone()).await?;
    server.shutdown().await;
    ensure_code(&out, 0)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("Total Requests:"), "stdout:\n{stdout}");

    let raw = std::fs::read(&export).context("read summary export")?;
    let doc: serde_json::Value = serde_json::from_slice(&raw)?;
    let reqs = doc
        .pointer("/metrics/http_reqs/values/count")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or_default();
    anyhow::ensure!(reqs >= 2.0, "unexpected export:\n{doc:#}");
    anyhow::ensure!(
        doc.pointer("/root_group/checks").is_some_and(serde_json::Value::is_array),
        "unexpected export:\n{doc:#}"
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_error_threshold_exits_11() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerOptions {
        run: EndpointBehavior::reply(Reply::MissingSuccessField),
        ..TestServerOptions::default()
    })
    .await
    .context("start test server")?;
    let dir = tempfile::tempdir()?;

    let out = short_run(server.base_url().to_string(), dir.path().join("r.json")).await?;
    server.shutdown().await;
    ensure_code(&out, 11)?;

    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::ensure!(stderr.contains("threshold failed: errors"), "stderr:\n{stderr}");

    Ok(())
}
