//! Proxy listener lifecycle.
//!
//! [`TileInterceptor`] is the surface a host application drives: `enable`
//! binds the first free port in the configured range and starts serving,
//! `disable` shuts the listener down and releases the socket.

use axum::{http::Method, routing::get, Extension, Router};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::handlers;
use crate::state::AppState;

/// How long `disable` waits for open connections to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no free port in {host}:{first}-{last}")]
    NoPortAvailable { host: IpAddr, first: u16, last: u16 },

    #[error("failed to read bound address: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the proxy router: `/proxy/...` and a 404 for everything else.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/proxy/", get(handlers::proxy_handler))
        .route("/proxy/*url", get(handlers::proxy_handler))
        .fallback(handlers::not_found_handler)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        )
}

/// Bind the first free port in `base..base + range` (at least one port is tried).
pub async fn bind_in_range(host: IpAddr, base: u16, range: u16) -> Result<TcpListener, ServerError> {
    let count = usize::from(range.max(1));
    let mut last = base;
    for port in (base..=u16::MAX).take(count) {
        last = port;
        match TcpListener::bind(SocketAddr::new(host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => debug!(port, error = %e, "Port unavailable, trying next"),
        }
    }
    Err(ServerError::NoPortAvailable {
        host,
        first: base,
        last,
    })
}

/// Proxied URL for `original` on a listener at `addr`.
///
/// The original URL becomes a single path segment with every character
/// other than ASCII letters and digits percent-encoded.
pub fn proxy_url_for(addr: SocketAddr, original: &str) -> String {
    let host = if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    };
    format!(
        "http://{}{}{}",
        host,
        handlers::PROXY_PREFIX,
        utf8_percent_encode(original, NON_ALPHANUMERIC)
    )
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Start/stop handle for one proxy instance.
pub struct TileInterceptor {
    config: ProxyConfig,
    state: Arc<AppState>,
    running: Mutex<Option<RunningServer>>,
}

impl TileInterceptor {
    pub fn new(config: ProxyConfig, state: Arc<AppState>) -> Self {
        Self {
            config,
            state,
            running: Mutex::new(None),
        }
    }

    /// Load styles and open the archive named by `config`.
    pub fn from_config(config: ProxyConfig) -> anyhow::Result<Self> {
        let state = Arc::new(AppState::from_config(&config)?);
        Ok(Self::new(config, state))
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Start serving if not already running. Returns the bound port.
    pub async fn enable(&self) -> Result<u16, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            if !server.task.is_finished() {
                return Ok(server.addr.port());
            }
            warn!(port = server.addr.port(), "Proxy server exited unexpectedly, restarting");
        }

        let listener =
            bind_in_range(self.config.host, self.config.base_port, self.config.port_range).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let app = router(self.state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    signal.await.ok();
                })
                .await
        });

        info!(
            address = %addr,
            corrections = self.state.corrector.is_enabled(),
            "Tile proxy listening"
        );
        *running = Some(RunningServer {
            addr,
            shutdown,
            task,
        });
        Ok(addr.port())
    }

    /// Stop serving and release the socket. Does nothing when stopped.
    pub async fn disable(&self) {
        let Some(server) = self.running.lock().await.take() else {
            return;
        };

        // The receiver is gone if the server already exited
        let _ = server.shutdown.send(());

        let mut task = server.task;
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Proxy server stopped with an error"),
            Ok(Err(e)) => warn!(error = %e, "Proxy server task failed"),
            Err(_) => {
                warn!("Open connections did not close in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
        info!(address = %server.addr, "Tile proxy stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .map_or(false, |s| !s.task.is_finished())
    }

    /// Bound port while running.
    pub async fn port(&self) -> Option<u16> {
        self.local_addr().await.map(|a| a.port())
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.addr)
    }

    /// Proxied URL for `original`, or `None` while stopped.
    pub async fn proxy_url(&self, original: &str) -> Option<String> {
        self.local_addr()
            .await
            .map(|addr| proxy_url_for(addr, original))
    }
}
