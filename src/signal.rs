//! Signal handling for graceful shutdown.

use std::future::Future;
use std::io;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Wait for a shutdown signal (SIGINT or SIGTERM on Unix) and name it.
///
/// Fails if the handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// Cancel `token` once a shutdown signal arrives.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(cancel_when(shutdown_signal(), token))
}

/// Cancel `token` when `signal` resolves. If listening failed the token is
/// left alone for good: no signal was received, so nothing asked to stop.
async fn cancel_when<F>(signal: F, token: CancellationToken)
where
    F: Future<Output = io::Result<&'static str>>,
{
    match signal.await {
        Ok(name) => {
            info!(message = "Signal received.", signal = name);
            token.cancel();
        }
        Err(e) => {
            error!(error = ?e, "Failed to listen for shutdown signals, stop the process another way");
            std::future::pending::<()>().await;
        }
    }
}
