use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::http::connection::{Connection, Limits};
use crate::http::handler::Handler;

/// Pause after a failed accept, so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Binds the configured address and serves connections until cancelled.
pub async fn run<H: Handler>(cfg: &ServerConfig, handler: Arc<H>) -> anyhow::Result<()> {
    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    serve(listener, Limits::from(cfg), handler).await;
    Ok(())
}

/// Accepts connections on an already bound listener, one task per socket.
///
/// Accept errors are logged and never end the loop.
pub async fn serve<H: Handler>(listener: TcpListener, limits: Limits, handler: Arc<H>) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        debug!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        let limits = limits.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, handler, limits);
            if let Err(e) = conn.run().await {
                warn!("Connection error from {}: {:#}", peer, e);
            }
        });
    }
}
