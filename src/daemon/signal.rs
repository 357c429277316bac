//! Signal handling for graceful shutdown.

use tracing::info;

/// Wait for the first shutdown signal (SIGINT, SIGTERM, or SIGQUIT).
#[cfg(unix)]
pub(crate) async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = interrupt.recv() => info!(signal = "SIGINT", "Signal received"),
        _ = terminate.recv() => info!(signal = "SIGTERM", "Signal received"),
        _ = quit.recv() => info!(signal = "SIGQUIT", "Signal received"),
    }
}

/// Wait for ctrl-c on platforms without Unix signals.
#[cfg(not(unix))]
pub(crate) async fn shutdown_signal() {
    use tracing::error;

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    info!(signal = "ctrl-c", "Signal received");
}
