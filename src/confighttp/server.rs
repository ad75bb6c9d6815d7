//! Running HTTP server handle.

use std::io;
use std::net::SocketAddr;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

use super::BindError;
use crate::context::{Context, ContextError};

/// Failures while stopping a server.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The context finished before in-flight requests drained.
    #[error("shutdown interrupted: {0}")]
    Context(#[from] ContextError),

    /// The serve loop exited with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    /// The serve task panicked.
    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Handle to an HTTP server running on a background task.
pub struct HttpServer {
    /// Triggers graceful shutdown.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Serve loop task.
    task: JoinHandle<io::Result<()>>,
    /// Bound address.
    addr: SocketAddr,
}

impl HttpServer {
    /// Starts serving `router` on `listener` in a background task.
    ///
    /// Returns as soon as the task is spawned; requests are handled on the
    /// runtime, not on the caller.
    pub fn serve(listener: TcpListener, router: Router) -> Result<Self, BindError> {
        let addr = listener.local_addr().map_err(|source| BindError::Listen {
            endpoint: "<bound listener>".to_string(),
            source,
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = &result {
                tracing::error!("HTTP server error on {}: {}", addr, e);
            }
            result
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task,
            addr,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    ///
    /// If `ctx` finishes first the serve task is aborted, which closes the
    /// socket, and the context error is returned.
    pub async fn shutdown(mut self, ctx: &Context) -> Result<(), ShutdownError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        tokio::select! {
            biased;
            joined = &mut self.task => match joined? {
                Ok(()) => Ok(()),
                Err(e) => Err(ShutdownError::Serve(e)),
            },
            err = ctx.done() => {
                self.task.abort();
                tracing::warn!("HTTP server on {} did not drain: {}", self.addr, err);
                Err(ShutdownError::Context(err))
            }
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::routing::get;

    async fn spawn_server() -> HttpServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let router = Router::new().route("/", get(|| async { "ok" }));
        HttpServer::serve(listener, router).unwrap()
    }

    #[tokio::test]
    async fn test_serve_binds_address() {
        let server = spawn_server().await;
        assert_ne!(server.local_addr().port(), 0);
        server.shutdown(&Context::background()).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_port() {
        let server = spawn_server().await;
        let addr = server.local_addr();
        server
            .shutdown(&Context::with_timeout(Duration::from_secs(1)))
            .await
            .unwrap();

        let rebound = TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_with_expired_context_returns() {
        let server = spawn_server().await;
        let ctx = Context::with_timeout(Duration::ZERO);

        let result = tokio::time::timeout(Duration::from_secs(2), server.shutdown(&ctx)).await;
        assert!(result.is_ok(), "shutdown hung on an expired context");
    }
}
