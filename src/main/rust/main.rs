use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};
use warp::Filter;

use stream_watchdog::{
    Config, HttpRelayClient, LogView, MjpegTransport, PrometheusReporter, StreamSupervisor,
    SupervisorOptions,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    info!("Starting stream watchdog");
    info!("  Stream URL: {}", config.stream_url);
    info!("  Relay URL: {}", config.relay_url);
    info!("  Metrics port: {}", config.metrics_port);

    // Convert CLI config to domain values
    let target = config
        .to_stream_target()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let backoff = config
        .to_backoff_policy()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    // Create infrastructure implementations (dependency injection)
    let (events_tx, events_rx) = StreamSupervisor::event_channel();
    let transport = MjpegTransport::new(events_tx, config.stall_window())
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let relay = Arc::new(
        HttpRelayClient::new(&config.relay_url).map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let metrics_reporter = Arc::new(PrometheusReporter::new());

    // Create application service
    let supervisor = StreamSupervisor::new(
        Box::new(transport),
        relay,
        Arc::new(LogView::new()),
        metrics_reporter,
        target,
        SupervisorOptions {
            backoff,
            timing: config.to_timing(),
            pause_when_hidden: config.pause_when_hidden,
        },
        events_rx,
    );
    let handle = supervisor.handle();

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let shutdown_tx = Arc::new(tokio::sync::Mutex::new(Some(shutdown_tx)));

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    let handle_for_signal = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl+c");
        info!("Received shutdown signal");
        handle_for_signal.shutdown().await;
        if let Some(tx) = shutdown_tx_clone.lock().await.take() {
            let _ = tx.send(());
        }
    });

    // Start metrics server
    let metrics_port = config.metrics_port;
    let metrics_server = {
        // CORS configuration for browser access
        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "OPTIONS"])
            .allow_headers(vec!["Content-Type"]);

        let health_route = warp::path("health")
            .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

        let metrics_route = warp::path("metrics").map(|| {
            warp::reply::with_header(
                String::from_utf8_lossy(&PrometheusReporter::gather_metrics()).into_owned(),
                "Content-Type",
                "text/plain; charset=utf-8",
            )
        });

        let routes = health_route.or(metrics_route).with(cors);

        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], metrics_port), async {
                shutdown_rx.await.ok();
            });

        info!("Metrics server listening on http://{}", addr);
        tokio::spawn(server)
    };

    // Run the supervisor on the runtime until shutdown
    let supervisor_handle = tokio::spawn(async move {
        if let Err(e) = supervisor.run().await {
            error!("Supervisor error: {}", e);
        }
    });

    // Wait for the supervisor to complete
    supervisor_handle.await?;

    // Signal shutdown to metrics server
    if let Some(tx) = shutdown_tx.lock().await.take() {
        let _ = tx.send(());
    }

    // Wait for metrics server to shut down
    metrics_server.await?;

    info!("Watchdog shutdown complete");
    Ok(())
}
