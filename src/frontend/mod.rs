mod backend;
mod conn;
mod http;
mod pipeline;

pub use backend::{HttpBackend, RequestDescriptor};
pub use conn::BufConn;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FrontendConfig;
use crate::error::{FrontendError, Result, ServeError};
use crate::frontend::conn::TransferSnapshot;
use crate::pattern::Pattern;
use crate::routing::{Restriction, Route, RouteTable};
use crate::telemetry::{FrontendMetrics, Metrics};

/// The interval at which the background worker wakes to honor cancellation.
const WORKER_TICK: Duration = Duration::from_millis(100);

/// Immutable frontend configuration with compiled patterns.
///
/// Construction of a [`Frontend`] deep-copies this value, so the frontend
/// never shares compiled state with the caller. Zero durations disable the
/// corresponding deadline.
pub struct FrontendOptions {
    pub name: String,
    /// Wall-clock budget for a single request, header read to backend
    /// completion.
    pub timeout: Duration,
    /// Maximum idle time between consecutive requests on one connection.
    pub keep_alive_timeout: Duration,
    pub default_backend: Arc<dyn HttpBackend>,
    pub routes: Vec<Route>,
}

impl std::fmt::Debug for FrontendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontendOptions")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("keep_alive_timeout", &self.keep_alive_timeout)
            .field("default_backend", &self.default_backend.name())
            .field("routes", &self.routes)
            .finish()
    }
}

impl FrontendOptions {
    /// Resolve a parsed configuration against a registry of named backends,
    /// compiling every pattern.
    pub fn from_config(
        cfg: &FrontendConfig,
        backends: &HashMap<String, Arc<dyn HttpBackend>>,
    ) -> Result<Self> {
        let lookup = |name: &str| {
            backends
                .get(name)
                .cloned()
                .ok_or_else(|| FrontendError::UnknownBackend(name.to_string()))
        };
        let mut routes = Vec::with_capacity(cfg.routes.len());
        for rc in &cfg.routes {
            let mut restrictions = Vec::with_capacity(rc.restrictions.len());
            for res in &rc.restrictions {
                restrictions.push(Restriction {
                    network: res.network,
                    path: res.path.as_deref().map(Pattern::compile).transpose()?,
                    invert: res.invert,
                    and_after: res.and_after,
                });
            }
            routes.push(Route {
                host: Pattern::compile(&rc.host)?,
                path: Pattern::compile(&rc.path)?,
                backend: lookup(&rc.backend)?,
                restrictions,
            });
        }
        Ok(Self {
            name: cfg.name.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
            keep_alive_timeout: Duration::from_millis(cfg.keep_alive_timeout_ms),
            default_backend: lookup(&cfg.default_backend)?,
            routes,
        })
    }

    /// Deep copy with every pattern recompiled from its raw text.
    pub fn recompiled(&self) -> Result<Self> {
        let mut routes = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            let mut restrictions = Vec::with_capacity(route.restrictions.len());
            for res in &route.restrictions {
                restrictions.push(Restriction {
                    network: res.network,
                    path: res.path.as_ref().map(Pattern::recompiled).transpose()?,
                    invert: res.invert,
                    and_after: res.and_after,
                });
            }
            routes.push(Route {
                host: route.host.recompiled()?,
                path: route.path.recompiled()?,
                backend: route.backend.clone(),
                restrictions,
            });
        }
        Ok(Self {
            name: self.name.clone(),
            timeout: self.timeout,
            keep_alive_timeout: self.keep_alive_timeout,
            default_backend: self.default_backend.clone(),
            routes,
        })
    }
}

/// Accept-side HTTP/1.x terminator: owns the compiled route table, the
/// per-frontend metric handles and a background worker, and drives one
/// keep-alive connection loop per accepted socket.
pub struct Frontend {
    name: String,
    timeout: Duration,
    keep_alive_timeout: Duration,
    table: RouteTable,
    metrics: FrontendMetrics,
    shared_metrics: Arc<Metrics>,
    worker: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Frontend {
    /// Build a frontend. The options are deep-copied (patterns recompiled
    /// from text) and the metric vectors are curried with the frontend name.
    /// Must be called from within a tokio runtime; the worker task starts
    /// immediately.
    pub fn new(opts: FrontendOptions, metrics: &Arc<Metrics>) -> Result<Self> {
        if opts.name.is_empty() {
            return Err(FrontendError::Config("frontend name must not be empty".to_string()));
        }
        let opts = opts.recompiled()?;
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(cancel.clone()));
        Ok(Self {
            metrics: metrics.for_frontend(&opts.name),
            shared_metrics: metrics.clone(),
            name: opts.name,
            timeout: opts.timeout,
            keep_alive_timeout: opts.keep_alive_timeout,
            table: RouteTable::new(opts.routes, opts.default_backend),
            worker: Some(worker),
            cancel,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current options as an independent deep copy; patterns are
    /// recompiled, so mutating the copy cannot affect this frontend.
    pub fn get_opts(&self) -> Result<FrontendOptions> {
        FrontendOptions {
            name: self.name.clone(),
            timeout: self.timeout,
            keep_alive_timeout: self.keep_alive_timeout,
            default_backend: self.table.default_backend().clone(),
            routes: self.table.routes().to_vec(),
        }
        .recompiled()
    }

    /// Construct an independent frontend serving the same configuration.
    /// This frontend keeps serving.
    pub fn fork(&self) -> Result<Frontend> {
        Frontend::new(self.get_opts()?, &self.shared_metrics)
    }

    /// Stop the background worker and join it.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    /// Own one accepted connection until final close: a keep-alive loop that
    /// peeks for the next request and drives the request pipeline, keeping
    /// the idle/active connection gauges balanced.
    ///
    /// `shutdown` ends the idle wait between requests; an in-flight request
    /// is left to finish.
    pub async fn serve(&self, stream: TcpStream, shutdown: CancellationToken) {
        let mut conn = BufConn::new(stream);
        if let Err(e) = conn.set_keepalive() {
            debug!(frontend = %self.name, error = %e, "failed to enable TCP keepalive");
        }
        let address = conn.local_addr().map(|a| a.to_string()).unwrap_or_default();
        let peer = conn.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        debug!(frontend = %self.name, %peer, "connection accepted");

        let mut transferred = TransferSnapshot::default();
        loop {
            let idle = self.metrics.idle_connections(&address);
            idle.inc();
            let peeked = tokio::select! {
                r = conn.peek(1) => Some(r.map(|_| ())),
                _ = keep_alive_wait(self.keep_alive_timeout) => None,
                _ = shutdown.cancelled() => None,
            };
            idle.dec();
            match peeked {
                None => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }

            let active = self.metrics.active_connections(&address);
            active.inc();
            let result = self.serve_request(&mut conn, &address, &mut transferred).await;
            active.dec();

            match result {
                Ok(()) => {}
                Err(ServeError::GracefulTermination | ServeError::ExpectedEof) => break,
                Err(e) => {
                    warn!(frontend = %self.name, %peer, error = %e, "request failed");
                    break;
                }
            }
        }
        debug!(frontend = %self.name, %peer, "connection closed");
    }
}

/// Sleep for the keep-alive timeout, or forever when it is disabled.
async fn keep_alive_wait(timeout: Duration) {
    if timeout.is_zero() {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep(timeout).await
    }
}

async fn run_worker(cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(WORKER_TICK);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
    }
}
