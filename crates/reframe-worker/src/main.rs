//! Crop planning worker binary.
//!
//! Reads one JSON request from stdin and writes the JSON response to
//! stdout. Exits non-zero when the request fails.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use reframe_media::CancelSignal;
use reframe_models::ErrorKind;
use reframe_worker::{
    init_tracing, Operation, ProcessingContext, RequestProcessor, WorkerConfig, WorkerRequest,
    WorkerResponse,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting reframe-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read request from stdin")?;

    let request: WorkerRequest = match serde_json::from_str(&input) {
        Ok(request) => request,
        Err(e) => {
            error!("Malformed request: {}", e);
            let response = WorkerResponse::failure(
                Operation::Analyze,
                ErrorKind::InvalidRequest,
                format!("malformed request: {}", e),
            );
            println!("{}", serde_json::to_string_pretty(&response)?);
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(
        ProcessingContext::initialize(config)
            .await
            .context("Failed to initialize processing context")?,
    );
    let processor = RequestProcessor::new(Arc::clone(&ctx));

    // Ctrl-C cancels the in-flight request.
    let (cancel_tx, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, cancelling request");
            let _ = cancel_tx.send(true);
        }
    });

    let response = processor.handle(request, cancel).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    ctx.shutdown().await?;
    info!("Worker shutdown complete");

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
