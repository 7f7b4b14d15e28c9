//! Server lifecycle: bind, serve, drain, stop.
//!
//! State machine: Starting -> Serving -> ShuttingDown -> Stopped
//!
//! [`Server::bind`] is the only fallible startup step. [`Server::run`]
//! accepts connections until the shutdown future resolves. Every connection
//! runs on a task owned by the server, so once accepting stops the open
//! connections get `drain_timeout` to finish their in-flight requests and
//! are aborted when the deadline passes. The machine is one-shot: `run`
//! consumes the server.

use crate::config::Config;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle state of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
}

/// Lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound; retrying cannot help
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// In-flight requests were still running when the drain deadline passed
    #[error("graceful shutdown exceeded {0:?}")]
    ShutdownTimeout(Duration),
}

/// A bound server with its fully wrapped router
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    drain_timeout: Duration,
    header_read_timeout: Duration,
    state: watch::Sender<ServerState>,
}

impl Server {
    /// Bind the configured address
    pub async fn bind(config: &Config, router: Router) -> Result<Self, ServerError> {
        let (state, _) = watch::channel(ServerState::Starting);
        let addr = config.bind_addr();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(addr = %local_addr, "Server listening");

        Ok(Self {
            listener,
            local_addr,
            router,
            drain_timeout: config.shutdown_timeout,
            header_read_timeout: config.header_read_timeout,
            state,
        })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve until `shutdown` resolves, then drain within the deadline.
    ///
    /// Returns `Ok(())` on a clean stop. If the deadline passes first every
    /// remaining connection is aborted, so its clients see the connection
    /// close without a response, and [`ServerError::ShutdownTimeout`] is
    /// returned.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            router,
            drain_timeout,
            header_read_timeout,
            state,
            ..
        } = self;

        let cancel = CancellationToken::new();
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        state.send_replace(ServerState::Serving);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            header_read_timeout,
                            cancel.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_exit(finished);
                }
            }
        }

        // Refuse new connections from here on
        drop(listener);

        state.send_replace(ServerState::ShuttingDown);
        info!(
            drain_timeout_secs = drain_timeout.as_secs_f64(),
            open_connections = connections.len(),
            "Shutting down, draining in-flight requests"
        );
        cancel.cancel();

        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(finished) = connections.join_next().await {
                log_connection_exit(finished);
            }
        })
        .await;

        let result = match drained {
            Ok(()) => {
                info!("Drain complete");
                Ok(())
            }
            Err(_) => {
                warn!(
                    open_connections = connections.len(),
                    "Drain deadline passed, abandoning open connections"
                );
                connections.shutdown().await;
                Err(ServerError::ShutdownTimeout(drain_timeout))
            }
        };

        state.send_replace(ServerState::Stopped);
        result
    }
}

/// Serve HTTP/1.1 on one accepted connection until the client leaves or the
/// server asks it to wind down.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    header_read_timeout: Duration,
    cancel: CancellationToken,
) {
    // Router is always ready, so calling it without poll_ready is fine
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().call(request)
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout);

    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut winding_down = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!(peer = %peer, error = %e, "Connection closed with error");
                }
                break;
            }
            () = cancel.cancelled(), if !winding_down => {
                // Finish the current exchange, then close instead of keeping alive
                winding_down = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

fn log_connection_exit(finished: Result<(), JoinError>) {
    if let Err(e) = finished {
        if e.is_panic() {
            error!(error = %e, "Connection task panicked");
        }
    }
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        () = ctrl_c => info!(signal = "SIGINT", "Shutdown signal received"),
        () = terminate => info!(signal = "SIGTERM", "Shutdown signal received"),
    }
}
