use broadcaster_worker::{run, Args};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> broadcaster_worker::Result<()> {
    let args = Args::parse();
    common::init_logger(&args.log_level).expect("logger should initialize");

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received, draining in-flight work");
        shutdown_signal.cancel();
    });

    run(args, shutdown).await
}
