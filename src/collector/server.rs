// src/collector/server.rs
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::handler::ConnectionHandler;
use crate::config::ServerConfig;
use crate::error::CollectorError;
use crate::traits::CdrSink;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct CdrServer {
    listener: TcpListener,
    handler: Arc<ConnectionHandler>,
    shutdown_timeout: Duration,
}

impl CdrServer {
    /// Bind the listen address. Failing here is fatal for the process.
    pub async fn bind(config: &ServerConfig, sink: Arc<dyn CdrSink>) -> Result<Self, CollectorError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| CollectorError::Bind {
                address: config.bind_address(),
                source,
            })?;

        Ok(Self {
            listener,
            handler: Arc::new(ConnectionHandler::new(sink, config.max_line_length)),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, shutdown: CancellationToken) {
        match self.listener.local_addr() {
            Ok(addr) => info!(address = %addr, "Avaya collector server started"),
            Err(e) => warn!(error = %e, "Avaya collector server started, local address unknown"),
        }

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let handler = self.handler.clone();
                        let shutdown = shutdown.clone();
                        connections.spawn(
                            serve_connection(socket, peer, handler, shutdown)
                                .instrument(info_span!("connection", peer = %peer)),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_join_result(joined);
                }
            }
        }

        drop(self.listener);
        info!(
            active_connections = connections.len(),
            "Stopped accepting connections, draining"
        );

        let drain = async {
            while let Some(joined) = connections.join_next().await {
                log_join_result(joined);
            }
        };
        let drained = tokio::time::timeout(self.shutdown_timeout, drain).await.is_ok();

        if !drained {
            warn!(
                remaining = connections.len(),
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Drain timeout reached, aborting connections"
            );
            connections.shutdown().await;
        }

        info!("Avaya collector server stopped");
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    handler: Arc<ConnectionHandler>,
    shutdown: CancellationToken,
) {
    info!(peer = %peer, "Client connected");

    let (stats, reason) = handler.handle(&mut socket, &shutdown).await;

    if let Err(e) = socket.shutdown().await {
        debug!(error = %e, "Socket shutdown failed");
    }

    info!(
        peer = %peer,
        reason = ?reason,
        lines = stats.lines,
        stored = stats.stored,
        invalid = stats.invalid,
        store_failures = stats.store_failures,
        blank = stats.blank,
        oversized = stats.oversized,
        "Client disconnected"
    );
}

fn log_join_result(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Connection task panicked");
        } else {
            debug!(error = %e, "Connection task cancelled");
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
