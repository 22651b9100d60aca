//! Shutdown signal handling.

#[cfg(unix)]
pub struct Shutdown {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Shutdown {
    /// Installs the handlers up front so a signal arriving while the bridge
    /// is busy rebuilding is not lost.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            // equivalent to Ctrl+C
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::info!("received SIGTERM signal, initiating graceful shutdown");
            }
            _ = self.sigint.recv() => {
                tracing::info!("received SIGINT signal, initiating graceful shutdown");
            }
        }
    }
}

// Best-effort implementation for non-unix systems
#[cfg(not(unix))]
pub struct Shutdown;

#[cfg(not(unix))]
impl Shutdown {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(?err, "failed to listen for CTRL+C");
            return std::future::pending().await;
        }
        tracing::info!("received CTRL+C signal, initiating graceful shutdown");
    }
}
