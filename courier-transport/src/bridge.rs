//! Correlated request/response messaging across a context boundary.
//!
//! ```text
//! send_request ──► pending[id] = tx ──► transport.post(request)
//!                                              │
//!       other context answers, host calls ─────┘
//! resolve(response) ──► pending.remove(id) ──► tx.send ──► send_request returns
//! ```
//!
//! Every request carries a correlation id and an explicit timeout. A request
//! leaves the pending table when it is answered, when the timeout fires or
//! when the caller drops the future.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::ElementNode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, InjectionError};
use crate::target::{InsertionPoint, TargetRuntime};

/// Outgoing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    /// Correlation id.
    pub id: u64,
    /// Action name.
    pub action: String,
    /// Action arguments.
    #[serde(default)]
    pub payload: Value,
}

/// Incoming answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    /// Correlation id of the request being answered.
    pub id: u64,
    /// Whether the action succeeded.
    pub ok: bool,
    /// Result on success.
    #[serde(default)]
    pub payload: Value,
    /// Error code on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl BridgeResponse {
    /// Successful response.
    #[must_use]
    pub fn success(id: u64, payload: Value) -> Self {
        Self {
            id,
            ok: true,
            payload,
            error_code: None,
            error_message: None,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn failure(id: u64, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            payload: Value::Null,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Delivers requests to the other context.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Post a request. Answers come back through [`RequestBridge::resolve`].
    async fn post(&self, request: BridgeRequest) -> Result<(), BridgeError>;
}

type Pending = HashMap<u64, oneshot::Sender<BridgeResponse>>;

/// Request/response futures over a [`BridgeTransport`].
pub struct RequestBridge {
    transport: Arc<dyn BridgeTransport>,
    config: BridgeConfig,
    request_id: AtomicU64,
    pending: Mutex<Pending>,
}

impl std::fmt::Debug for RequestBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBridge")
            .field("config", &self.config)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl RequestBridge {
    /// Bridge with default configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn BridgeTransport>) -> Self {
        Self::with_config(transport, BridgeConfig::default())
    }

    /// Bridge with custom configuration.
    #[must_use]
    pub fn with_config(transport: Arc<dyn BridgeTransport>, config: BridgeConfig) -> Self {
        Self {
            transport,
            config,
            request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Default request timeout.
    #[must_use]
    pub fn default_timeout_ms(&self) -> u64 {
        self.config.request_timeout_ms
    }

    /// Requests still waiting for an answer.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Send `action` and wait up to `timeout_ms` for its answer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] if posting fails,
    /// [`BridgeError::Timeout`] if no answer arrives in time,
    /// [`BridgeError::Remote`] if the other side reports an error and
    /// [`BridgeError::Closed`] if the pending entry was dropped.
    pub async fn send_request(
        &self,
        action: &str,
        payload: Value,
        timeout_ms: u64,
    ) -> Result<Value, BridgeError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        // Removes the entry on every exit, including when the caller drops
        // this future before an answer arrives.
        let _guard = PendingGuard { bridge: self, id };

        debug!("Bridge request #{id} '{action}'");
        let request = BridgeRequest {
            id,
            action: action.to_string(),
            payload,
        };
        self.transport.post(request).await?;

        let response = match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(BridgeError::Closed),
            Err(_) => {
                warn!("Bridge request #{id} '{action}' timed out after {timeout_ms}ms");
                return Err(BridgeError::Timeout {
                    action: action.to_string(),
                    timeout_ms,
                });
            }
        };

        if response.ok {
            Ok(response.payload)
        } else {
            Err(BridgeError::Remote {
                code: response.error_code.unwrap_or_else(|| "unknown".into()),
                message: response.error_message.unwrap_or_default(),
            })
        }
    }

    /// Deliver an answer. Returns false if no request with that id is
    /// pending (late or unknown answers are ignored).
    pub fn resolve(&self, response: BridgeResponse) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&response.id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                debug!("Ignoring bridge response for unknown request #{}", response.id);
                false
            }
        }
    }

    /// Fail every pending request with [`BridgeError::Closed`].
    pub fn close(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

struct PendingGuard<'a> {
    bridge: &'a RequestBridge,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.bridge.forget(self.id);
    }
}

/// Bridge action names understood by the host-side agent.
pub mod actions {
    /// `{}` → `{"ready": bool}`
    pub const IS_READY: &str = "isReady";
    /// `{}` → `InsertionPoint | null`
    pub const INSERTION_POINT: &str = "getInsertionPoint";
    /// `{"tree", "insertionPoint"}` → `{}`
    pub const CREATE_NODE: &str = "createNode";
    /// `{"tree"}` → `{}`
    pub const INTERNAL_PASTE: &str = "internalPaste";
    /// `{"tree"}` → `{}`
    pub const APPEND_TO_VIEW: &str = "appendToView";
}

/// A [`TargetRuntime`] living on the other side of a [`RequestBridge`].
#[derive(Debug, Clone)]
pub struct BridgedRuntime {
    bridge: Arc<RequestBridge>,
    timeout_ms: u64,
}

impl BridgedRuntime {
    /// Runtime using the bridge's default timeout.
    #[must_use]
    pub fn new(bridge: Arc<RequestBridge>) -> Self {
        let timeout_ms = bridge.default_timeout_ms();
        Self { bridge, timeout_ms }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn call(&self, action: &str, payload: Value) -> Result<Value, InjectionError> {
        Ok(self
            .bridge
            .send_request(action, payload, self.timeout_ms)
            .await?)
    }
}

#[async_trait]
impl TargetRuntime for BridgedRuntime {
    async fn is_ready(&self) -> bool {
        match self.call(actions::IS_READY, json!({})).await {
            Ok(answer) => answer.get("ready").and_then(Value::as_bool).unwrap_or(false),
            Err(e) => {
                debug!("Readiness probe failed: {e}");
                false
            }
        }
    }

    async fn insertion_point(&self) -> Option<InsertionPoint> {
        match self.call(actions::INSERTION_POINT, json!({})).await {
            Ok(Value::Null) => None,
            Ok(answer) => serde_json::from_value(answer)
                .map_err(|e| warn!("Malformed insertion point from bridge: {e}"))
                .ok(),
            Err(e) => {
                warn!("Insertion point lookup failed: {e}");
                None
            }
        }
    }

    async fn create_node(
        &self,
        tree: &ElementNode,
        at: &InsertionPoint,
    ) -> Result<(), InjectionError> {
        self.call(
            actions::CREATE_NODE,
            json!({ "tree": tree, "insertionPoint": at }),
        )
        .await
        .map(drop)
    }

    async fn internal_paste(&self, tree: &ElementNode) -> Result<(), InjectionError> {
        self.call(actions::INTERNAL_PASTE, json!({ "tree": tree }))
            .await
            .map(drop)
    }

    async fn append_to_view(&self, tree: &ElementNode) -> Result<(), InjectionError> {
        self.call(actions::APPEND_TO_VIEW, json!({ "tree": tree }))
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::target::{InsertionSource, TargetHandle};
    use courier_core::ElementKind;
    use tokio::sync::mpsc;

    /// Forwards requests to a channel the test answers from.
    struct ChannelTransport {
        tx: mpsc::UnboundedSender<BridgeRequest>,
    }

    #[async_trait]
    impl BridgeTransport for ChannelTransport {
        async fn post(&self, request: BridgeRequest) -> Result<(), BridgeError> {
            self.tx
                .send(request)
                .map_err(|e| BridgeError::Transport(e.to_string()))
        }
    }

    fn bridge() -> (Arc<RequestBridge>, mpsc::UnboundedReceiver<BridgeRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = RequestBridge::with_config(
            Arc::new(ChannelTransport { tx }),
            BridgeConfig {
                request_timeout_ms: 200,
            },
        );
        (Arc::new(bridge), rx)
    }

    /// Answer every request with `answer(request)`.
    fn spawn_agent(
        bridge: Arc<RequestBridge>,
        mut rx: mpsc::UnboundedReceiver<BridgeRequest>,
        answer: impl Fn(&BridgeRequest) -> BridgeResponse + Send + 'static,
    ) {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                bridge.resolve(answer(&request));
            }
        });
    }

    #[tokio::test]
    async fn test_request_response_correlation() {
        let (bridge, rx) = bridge();
        spawn_agent(bridge.clone(), rx, |req| {
            BridgeResponse::success(req.id, json!({ "echo": req.action }))
        });
        let a = bridge.send_request("first", json!({}), 200).await.expect("first");
        let b = bridge.send_request("second", json!({}), 200).await.expect("second");
        assert_eq!(a["echo"], "first");
        assert_eq!(b["echo"], "second");
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_clears_pending() {
        let (bridge, _rx) = bridge();
        let err = bridge
            .send_request("slow", json!({}), 20)
            .await
            .expect_err("should time out");
        assert!(matches!(err, BridgeError::Timeout { timeout_ms: 20, .. }));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_clears_pending() {
        let (bridge, _rx) = bridge();
        for _ in 0..3 {
            let outer = tokio::time::timeout(
                Duration::from_millis(10),
                bridge.send_request("slow", json!({}), 3_000),
            )
            .await;
            assert!(outer.is_err(), "outer timeout should cancel the request");
        }
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_response_ignored() {
        let (bridge, _rx) = bridge();
        assert!(!bridge.resolve(BridgeResponse::success(999, Value::Null)));
    }

    #[tokio::test]
    async fn test_remote_error_surfaces() {
        let (bridge, rx) = bridge();
        spawn_agent(bridge.clone(), rx, |req| {
            BridgeResponse::failure(req.id, "no-insertion-point", "nothing selected")
        });
        let err = bridge
            .send_request("createNode", json!({}), 200)
            .await
            .expect_err("remote error");
        assert_eq!(InjectionError::from(err).kind(), FailureKind::NoInsertionPoint);
    }

    #[tokio::test]
    async fn test_bridged_runtime() {
        let (bridge, rx) = bridge();
        spawn_agent(bridge.clone(), rx, |req| match req.action.as_str() {
            actions::IS_READY => BridgeResponse::success(req.id, json!({ "ready": true })),
            actions::INSERTION_POINT => BridgeResponse::success(
                req.id,
                json!({ "handle": { "id": "doc", "kind": "page" }, "source": "document-root" }),
            ),
            actions::CREATE_NODE => BridgeResponse::success(req.id, json!({})),
            _ => BridgeResponse::failure(req.id, "api-unavailable", "unsupported"),
        });
        let runtime = BridgedRuntime::new(bridge);
        assert!(runtime.is_ready().await);
        let point = runtime.insertion_point().await.expect("point");
        assert_eq!(point.source, InsertionSource::DocumentRoot);
        assert_eq!(point.handle, TargetHandle::new("doc", ElementKind::Page));
        runtime
            .create_node(&ElementNode::section(), &point)
            .await
            .expect("create");
        let err = runtime
            .internal_paste(&ElementNode::section())
            .await
            .expect_err("unsupported");
        assert_eq!(err.kind(), FailureKind::ApiUnavailable);
    }
}
