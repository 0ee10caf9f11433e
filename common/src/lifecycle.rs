use tracing::info;

/// Resolves on Ctrl-C, or on SIGTERM where available.
pub async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("received interrupt");
            }
            _ = terminate.recv() => info!("received terminate"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received interrupt");
        Ok(())
    }
}
