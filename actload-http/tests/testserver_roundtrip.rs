use std::time::{Duration, Instant};

use actload_http::{HttpClient, HttpRequest, HttpTransportErrorKind};
use actload_testserver::{EndpointBehavior, Reply, TestServer, TestServerOptions};
use bytes::Bytes;

#[tokio::test]
async fn post_json_reaches_parse_endpoint() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();

    let req = HttpRequest::post_json(
        format!("{}/actions/parse", server.base_url()),
        Bytes::from_static(br#"{"text":"get user john.doe from clockify"}"#),
    )
    .with_header("x-request-id", "1-0")
    .with_timeout(Duration::from_secs(5));

    let res = client.request(req).await?;
    let stats = server.stats().clone();
    server.shutdown().await;

    assert_eq!(res.status, 200);
    assert!(res.header("content-type").is_some_and(
        |v| v.starts_with("text/plain") || v.starts_with("application/octet-stream")
    ));
    let body: serde_json::Value = serde_json::from_slice(&res.body)?;
    assert_eq!(body.get("action").and_then(|v| v.as_str()), Some("get_user"));
    assert!(res.bytes_sent > 0);
    assert_eq!(res.bytes_received, res.body.len() as u64);

    assert_eq!(stats.parse_requests_total(), 1);
    assert_eq!(stats.saw_json_content_type(), 1);
    assert_eq!(stats.request_ids(), vec!["1-0".to_string()]);
    Ok(())
}

#[tokio::test]
async fn non_200_status_is_a_response_not_an_error() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerOptions {
        run: EndpointBehavior::reply(Reply::Status(503)),
        ..TestServerOptions::default()
    })
    .await?;
    let client = HttpClient::default();

    let req = HttpRequest::post_json(
        format!("{}/actions/run", server.base_url()),
        Bytes::from_static(br#"{"action":"get_user","arguments":{},"mock":true}"#),
    );
    let res = client.request(req).await?;
    server.shutdown().await;

    assert_eq!(res.status, 503);
    Ok(())
}

#[tokio::test]
async fn slow_response_times_out() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerOptions {
        parse: EndpointBehavior::delayed(Duration::from_millis(500)),
        ..TestServerOptions::default()
    })
    .await?;
    let client = HttpClient::default();

    let req = HttpRequest::post_json(
        format!("{}/actions/parse", server.base_url()),
        Bytes::from_static(br#"{"text":"x"}"#),
    )
    .with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let err = match client.request(req).await {
        Ok(res) => anyhow::bail!("expected timeout, got status {}", res.status),
        Err(err) => err,
    };
    let elapsed = started.elapsed();
    server.shutdown().await;

    assert_eq!(err.transport_error_kind(), HttpTransportErrorKind::Timeout);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(500), "elapsed={elapsed:?}");
    Ok(())
}
