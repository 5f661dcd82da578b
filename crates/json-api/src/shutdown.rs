//! Graceful shutdown.

use std::{io, time::Duration};

use salvo::server::ServerHandle;
use thiserror::Error;
use tokio::signal;

#[derive(Debug, Error)]
#[error("failed to install {signal} handler")]
pub(crate) struct ShutdownSignalError {
    signal: &'static str,

    #[source]
    source: io::Error,
}

impl ShutdownSignalError {
    fn installing(signal: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { signal, source }
    }
}

/// Wait for a stop signal, then stop accepting connections and drain for up to `grace`.
pub(crate) async fn listen(handle: ServerHandle, grace: Duration) -> Result<(), ShutdownSignalError> {
    let signal = stop_signal().await?;

    tracing::info!(signal, grace_secs = grace.as_secs(), "draining in-flight requests");

    handle.stop_graceful(Some(grace));

    Ok(())
}

/// Resolves with the name of whichever stop signal arrives first.
async fn stop_signal() -> Result<&'static str, ShutdownSignalError> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::installing("SIGTERM"))?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(ShutdownSignalError::installing("Ctrl+C"))?;

                Ok("ctrl_c")
            }
            _ = terminate.recv() => Ok("sigterm"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .map_err(ShutdownSignalError::installing("Ctrl+C"))?;

        Ok("ctrl_c")
    }
}
