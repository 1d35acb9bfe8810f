use tokio::signal;
use tracing::info;

use crate::Result;

/// Waits for SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns [`crate::ServiceError::Io`] if a signal handler cannot be
/// installed.
pub async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, initiating shutdown");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating shutdown");
    }

    Ok(())
}
