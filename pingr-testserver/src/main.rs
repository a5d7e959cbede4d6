use std::net::SocketAddr;

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "-h" | "--help" => {
                eprintln!(
                    "pingr-testserver\n\nUSAGE:\n  pingr-testserver [--bind 127.0.0.1:0]\n\nROUTES:\n  /status  /slow?ms=N  /flaky?every=N  /error\n\nOUTPUT:\n  Prints STATUS_URL=<url> to stdout once ready."
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

    let stats = pingr_testserver::TestServerStats::default();
    let app = pingr_testserver::router(stats.clone());

    println!("STATUS_URL=http://{addr}{}", pingr_testserver::PATH_STATUS);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;

    eprintln!("served {} requests", stats.requests_total());
    Ok(())
}
