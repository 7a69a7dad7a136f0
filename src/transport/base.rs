//! State shared by send and receive transports

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::engine::EngineTransport;
use super::listener::TransportListener;
use super::pending::PendingRequest;
use super::{ConnectionState, TransportDirection};
use crate::error::{BroadcastError, Result};

/// Identity, state and connect-once logic of one transport
pub struct TransportBase {
    id: String,
    direction: TransportDirection,
    engine: Arc<dyn EngineTransport>,
    listener: Arc<dyn TransportListener>,
    state: RwLock<ConnectionState>,
    closed: AtomicBool,
    /// Held across the connect round trip so concurrent produce calls
    /// trigger a single `on_connect`
    connected: Mutex<bool>,
    request_timeout: Duration,
}

impl TransportBase {
    pub fn new(
        id: impl Into<String>,
        direction: TransportDirection,
        engine: Arc<dyn EngineTransport>,
        listener: Arc<dyn TransportListener>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            direction,
            engine,
            listener,
            state: RwLock::new(ConnectionState::New),
            closed: AtomicBool::new(false),
            connected: Mutex::new(false),
            request_timeout,
        }
    }

    /// Server-assigned transport id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> TransportDirection {
        self.direction
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> &Arc<dyn EngineTransport> {
        &self.engine
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BroadcastError::InvalidState(format!(
                "{} transport {} is closed",
                self.direction, self.id
            )));
        }
        Ok(())
    }

    /// Run the connect round trip on first use
    ///
    /// A failed attempt leaves the transport unconnected so the next
    /// produce/consume tries again.
    pub(crate) async fn ensure_connected(&self) -> Result<()> {
        let mut connected = self.connected.lock().await;
        if *connected {
            return Ok(());
        }

        debug!("Connecting {} transport {}", self.direction, self.id);
        let (pending, reply) = PendingRequest::new("connect");
        self.listener
            .on_connect(&self.id, self.engine.local_dtls_parameters(), pending)
            .await;
        reply.wait(self.request_timeout).await?;

        *connected = true;
        info!("{} transport {} connected to server", self.direction, self.id);
        Ok(())
    }

    pub(crate) async fn connection_state_changed(&self, state: ConnectionState) {
        {
            let mut current = self.state.write();
            if *current == ConnectionState::Closed {
                return;
            }
            *current = state;
        }
        self.listener
            .on_connection_state_change(&self.id, state)
            .await;
    }

    pub async fn restart_ice(&self, ice_parameters: Value) -> Result<()> {
        self.ensure_open()?;
        self.engine.restart_ice(ice_parameters).await
    }

    pub async fn update_ice_servers(&self, ice_servers: Value) -> Result<()> {
        self.ensure_open()?;
        self.engine.update_ice_servers(ice_servers).await
    }

    /// Close the local transport; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.state.write() = ConnectionState::Closed;
        self.engine.close();
        info!("{} transport {} closed", self.direction, self.id);
    }
}

impl std::fmt::Debug for TransportBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBase")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("state", &self.connection_state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
