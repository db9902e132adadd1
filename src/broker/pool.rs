//! The broker connection pool: round-robin dispatch over P persistent
//! connections under a global in-flight cap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{oneshot, Semaphore};
use tracing::{info, warn};

use crate::error::BrokerError;

use super::connection::{self, Command, Connection};
use super::Endpoint;

/// Pool of authorized broker connections.
pub struct BrokerPool {
    connections: Vec<Connection>,
    next: AtomicUsize,
    /// Global cap on simultaneous in-flight requests across all bots.
    in_flight: Arc<Semaphore>,
}

impl BrokerPool {
    /// Authorize `pool_size` connections against the shared credential.
    ///
    /// Initialization succeeds if at least one connection comes up;
    /// a pool with zero live connections fails loudly.
    pub async fn connect(
        ws_url: &str,
        token: &str,
        pool_size: usize,
        max_in_flight: usize,
    ) -> Result<Self, BrokerError> {
        let attempts = pool_size.clamp(1, 4);
        let mut connections = Vec::with_capacity(attempts);
        let mut last_error = None;

        let handles: Vec<_> = (0..attempts)
            .map(|id| connection::spawn(id, ws_url.to_string(), token.to_string()))
            .collect();
        for result in futures_util::future::join_all(handles).await {
            match result {
                Ok(conn) => connections.push(conn),
                Err(e) => {
                    warn!(error = %e, "pool member failed to initialize");
                    last_error = Some(e);
                }
            }
        }

        if connections.is_empty() {
            return Err(last_error.unwrap_or(BrokerError::NoLiveConnections));
        }
        info!(
            live = connections.len(),
            requested = attempts,
            "broker pool ready"
        );
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
        })
    }

    /// Live connections currently in the pool.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.connections.iter().filter(|c| c.is_alive()).count()
    }

    /// Round-robin over live connections.
    fn pick(&self) -> Result<&Connection, BrokerError> {
        for _ in 0..self.connections.len() {
            let i = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
            let conn = &self.connections[i];
            if conn.is_alive() {
                return Ok(conn);
            }
        }
        Err(BrokerError::NoLiveConnections)
    }

    /// Dispatch one request and await its correlated response, under the
    /// global in-flight cap and the per-endpoint deadline.
    pub async fn request(&self, endpoint: Endpoint, payload: Value) -> Result<Value, BrokerError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| BrokerError::Cancelled)?;

        let conn = self.pick()?;
        let (tx, rx) = oneshot::channel();
        conn.send(Command::Request { payload, resp: tx }).await?;

        let deadline = endpoint.deadline();
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BrokerError::ConnectionClosed(
                "response channel dropped".into(),
            )),
            Err(_) => {
                warn!(endpoint = endpoint.name(), "request deadline exceeded");
                Err(BrokerError::Timeout {
                    endpoint: endpoint.name(),
                    seconds: deadline.as_secs(),
                })
            }
        }
    }

    /// Register a tick subscription on one pool member; pushes arrive on
    /// the returned channel's sender counterpart.
    pub(crate) async fn subscribe(
        &self,
        symbol: &str,
        payload: Value,
        sink: tokio::sync::mpsc::Sender<Value>,
    ) -> Result<(), BrokerError> {
        let conn = self.pick()?;
        conn.send(Command::Subscribe {
            payload,
            symbol: symbol.to_string(),
            sink,
        })
        .await
    }
}
