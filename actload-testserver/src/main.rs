use std::net::SocketAddr;

use actload_testserver::{EndpointBehavior, Reply, TestServerOptions, TestServerStats};
use tokio::net::TcpListener;
use tokio::time::Duration;

fn parse_reply(raw: &str) -> anyhow::Result<Reply> {
    match raw {
        "healthy" => Ok(Reply::Healthy),
        "missing-success" => Ok(Reply::MissingSuccessField),
        "invalid-json" => Ok(Reply::InvalidJson),
        other => {
            let code: u16 = other
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid --reply value: {other}"))?;
            Ok(Reply::Status(code))
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut behavior = EndpointBehavior::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--reply" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--reply requires a value"))?;
                behavior.reply = parse_reply(&raw)?;
            }
            "--delay-ms" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--delay-ms requires a value"))?;
                behavior.delay = Duration::from_millis(raw.parse()?);
            }
            "-h" | "--help" => {
                eprintln!(
                    "actload-testserver\n\nUSAGE:\n  actload-testserver [--bind 127.0.0.1:0] [--reply healthy|missing-success|invalid-json|<status>] [--delay-ms N]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let options = TestServerOptions {
        parse: behavior.clone(),
        run: behavior,
    };
    let app = actload_testserver::router(TestServerStats::default(), options);

    println!("HTTP_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
