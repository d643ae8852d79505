use super::transport::WsTransport;
use super::transport_trait::InspectorTransportTrait;
use super::types::{CdpCommand, Inbound, RawInbound};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

type EventCallback = Arc<dyn Fn(Option<Value>) + Send + Sync>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;
type CallbackMap = Arc<RwLock<HashMap<String, Vec<EventCallback>>>>;

/// §4.2 Inspector Client state machine. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Ready,
    Closing,
    Closed,
}

/// One full-duplex WebSocket connection to a child runtime's CDP inspector.
///
/// Correlates commands with replies by id and dispatches unsolicited events
/// to registered callbacks, serialized per event name by construction: the
/// single reader task invokes callbacks for a given event synchronously,
/// one at a time, in arrival order.
pub struct InspectorClient {
    transport: Arc<Mutex<Box<dyn InspectorTransportTrait>>>,
    next_id: Arc<AtomicU64>,
    pending: PendingMap,
    callbacks: CallbackMap,
    state: Arc<RwLock<ConnState>>,
    default_timeout: Duration,
}

impl InspectorClient {
    /// Connect to an inspector endpoint URL (e.g. `ws://127.0.0.1:9229/abcd`).
    pub async fn connect(url: &str, default_timeout: Duration) -> Result<Self> {
        let transport = WsTransport::connect(url).await?;
        Ok(Self::new_with_transport(Box::new(transport), default_timeout))
    }

    /// Build a client over an arbitrary transport (used by tests with a mock).
    pub fn new_with_transport(
        transport: Box<dyn InspectorTransportTrait>,
        default_timeout: Duration,
    ) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let callbacks: CallbackMap = Arc::new(RwLock::new(HashMap::new()));
        let state = Arc::new(RwLock::new(ConnState::Connecting));

        let client = Self {
            transport: transport.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
            pending: pending.clone(),
            callbacks: callbacks.clone(),
            state: state.clone(),
            default_timeout,
        };

        tokio::spawn(Self::reader_loop(transport, pending, callbacks, state));

        client
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnState {
        *self.state.read().await
    }

    async fn mark_ready(state: &Arc<RwLock<ConnState>>) {
        let mut s = state.write().await;
        if *s == ConnState::Connecting {
            *s = ConnState::Ready;
        }
    }

    async fn reader_loop(
        transport: Arc<Mutex<Box<dyn InspectorTransportTrait>>>,
        pending: PendingMap,
        callbacks: CallbackMap,
        state: Arc<RwLock<ConnState>>,
    ) {
        // A freshly connected socket is immediately usable; there is no
        // separate inspector-side handshake frame to wait for.
        Self::mark_ready(&state).await;

        loop {
            let text = {
                let mut t = transport.lock().await;
                t.recv_text().await
            };

            let text = match text {
                Ok(t) => t,
                Err(e) => {
                    warn!("inspector transport closed: {}", e);
                    break;
                }
            };

            let raw: RawInbound = match serde_json::from_str(&text) {
                Ok(r) => r,
                Err(e) => {
                    warn!("failed to parse inspector message: {}", e);
                    continue;
                }
            };

            match raw.classify() {
                Some(Inbound::Response { id, result }) => {
                    let mut pending = pending.lock().await;
                    if let Some(tx) = pending.remove(&id) {
                        let mapped = result.map_err(|e| Error::CdpError {
                            code: e.code,
                            message: e.message,
                        });
                        let _ = tx.send(mapped);
                    } else {
                        warn!("response for unknown request id {}", id);
                    }
                }
                Some(Inbound::Event { method, params }) => {
                    debug!("inspector event: {}", method);
                    let handlers = callbacks.read().await;
                    if let Some(hs) = handlers.get(&method) {
                        for h in hs {
                            h(params.clone());
                        }
                    }
                }
                None => warn!("unclassifiable inspector message: {}", text),
            }
        }

        // Disconnected: fail every outstanding call and mark Closed.
        let mut pending = pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(Error::Disconnected));
        }
        *state.write().await = ConnState::Closed;
    }

    /// Register a callback for `eventName`. Multiple callbacks for the same
    /// event are invoked in registration order, never concurrently with
    /// each other.
    pub async fn on<F>(&self, event_name: &str, handler: F)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        let mut callbacks = self.callbacks.write().await;
        callbacks
            .entry(event_name.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Send a CDP command and await the correlated reply, or `Timeout`
    /// after `default_timeout` (configurable per client).
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if *self.state.read().await == ConnState::Closed {
            return Err(Error::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let command = CdpCommand {
            id,
            method: method.to_string(),
            params,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        let text = serde_json::to_string(&command)?;
        {
            let mut transport = self.transport.lock().await;
            if let Err(e) = transport.send_text(text).await {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(e);
            }
        }

        match tokio::time::timeout(self.default_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::Timeout(method.to_string()))
            }
        }
    }

    /// Send with an explicit deadline overriding the client default.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        tokio::time::timeout(timeout, self.send(method, params))
            .await
            .map_err(|_| Error::Timeout(method.to_string()))?
    }

    /// Close the socket, fail every outstanding call with `Disconnected`,
    /// and clear subscribers. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == ConnState::Closed || *state == ConnState::Closing {
                return Ok(());
            }
            *state = ConnState::Closing;
        }

        {
            let mut transport = self.transport.lock().await;
            let _ = transport.close().await;
        }

        {
            let mut pending = self.pending.lock().await;
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err(Error::Disconnected));
            }
        }

        {
            let mut callbacks = self.callbacks.write().await;
            callbacks.clear();
        }

        *self.state.write().await = ConnState::Closed;
        info!("inspector client disconnected");
        Ok(())
    }
}
