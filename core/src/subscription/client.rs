/// WebSocket subscription client
///
/// Opens one socket per subscription and drives a `ProtocolSession` over it.
/// There is no reconnection: a dropped socket is reported once through
/// `on_error` and the channel ends.
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use super::protocol::{ClientMessage, ProtocolSession, SessionAction, SessionState, SUBPROTOCOL};
use super::ChannelHandle;
use crate::error::ClassifiedError;
use crate::graphql::types::GraphqlRequest;

/// A subscription document, its variables, and the decoder for its payloads
pub struct SubscriptionRequest<R> {
    /// Operation name, used in logs
    pub operation: &'static str,
    pub query: &'static str,
    pub variables: Value,
    pub decode: fn(Value) -> Result<R, ClassifiedError>,
}

impl<R> SubscriptionRequest<R> {
    pub fn graphql_request(&self) -> GraphqlRequest {
        GraphqlRequest::new(self.query, Some(self.variables.clone()))
    }
}

impl<R> Clone for SubscriptionRequest<R> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation,
            query: self.query,
            variables: self.variables.clone(),
            decode: self.decode,
        }
    }
}

impl<R> std::fmt::Debug for SubscriptionRequest<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("operation", &self.operation)
            .field("variables", &self.variables)
            .finish()
    }
}

/// Cancel handle for one open channel. Dropping it cancels the channel.
pub struct SubscriptionHandle {
    operation: &'static str,
    cancelled: Arc<AtomicBool>,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl SubscriptionHandle {
    fn new(
        operation: &'static str,
        cancelled: Arc<AtomicBool>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            operation,
            cancelled,
            cancel_tx: Mutex::new(Some(cancel_tx)),
        }
    }

    /// Stop the channel. Idempotent. Frames not yet dispatched when this
    /// returns are dropped; a callback already running may still finish.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let tx = self
            .cancel_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        debug!(target: "subscription_client", operation = self.operation, "Subscription cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ChannelHandle for SubscriptionHandle {
    fn cancel(&self) {
        SubscriptionHandle::cancel(self)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Client opening graphql-transport-ws subscriptions against one endpoint
#[derive(Clone, Debug)]
pub struct SubscriptionClient {
    url: Url,
}

impl SubscriptionClient {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open a channel. Returns immediately; events and errors arrive through
    /// the callbacks from a spawned task. Must be called inside a tokio runtime.
    pub fn open<R, E, F>(
        &self,
        request: SubscriptionRequest<R>,
        on_event: E,
        on_error: F,
    ) -> SubscriptionHandle
    where
        R: Send + 'static,
        E: Fn(R) + Send + Sync + 'static,
        F: Fn(ClassifiedError) + Send + Sync + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = SubscriptionHandle::new(request.operation, Arc::clone(&cancelled), cancel_tx);

        let channel = Channel {
            url: self.url.clone(),
            request,
            cancelled,
            on_event,
            on_error,
        };
        tokio::spawn(channel.run(cancel_rx));

        handle
    }
}

struct Channel<R, E, F> {
    url: Url,
    request: SubscriptionRequest<R>,
    cancelled: Arc<AtomicBool>,
    on_event: E,
    on_error: F,
}

impl<R, E, F> Channel<R, E, F>
where
    E: Fn(R) + Send + Sync + 'static,
    F: Fn(ClassifiedError) + Send + Sync + 'static,
{
    fn live(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    fn deliver_event(&self, record: R) {
        if self.live() {
            (self.on_event)(record);
        }
    }

    fn deliver_error(&self, error: ClassifiedError) {
        if self.live() {
            warn!(
                target: "subscription_client",
                operation = self.request.operation,
                code = ?error.code(),
                error = %error,
                "Subscription error"
            );
            (self.on_error)(error);
        }
    }

    async fn run(self, mut cancel_rx: oneshot::Receiver<()>) {
        let operation = self.request.operation;
        let mut session = ProtocolSession::new(self.request.graphql_request());

        let ws_request = match build_request(&self.url) {
            Ok(req) => req,
            Err(e) => {
                self.deliver_error(e);
                return;
            }
        };

        // Cancel while connecting: drop the pending handshake, nothing to send
        let ws = tokio::select! {
            _ = &mut cancel_rx => {
                debug!(target: "subscription_client", operation, "Cancelled before socket opened");
                return;
            }
            res = connect_async(ws_request) => match res {
                Ok((ws, _)) => ws,
                Err(e) => {
                    let message = format!("WebSocket connection to {} failed", self.url);
                    self.deliver_error(ClassifiedError::websocket(message).with_cause(e));
                    return;
                }
            },
        };
        info!(
            target: "subscription_client",
            operation,
            url = %self.url,
            "Subscription socket open"
        );

        let (mut sink, mut stream) = ws.split();

        if let Err(e) = send_frame(&mut sink, &session.on_open()).await {
            self.deliver_error(e);
            return;
        }

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    if let Some(frame) = session.cancel() {
                        let _ = send_frame(&mut sink, &frame).await;
                    }
                    let _ = sink.close().await;
                    break;
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match session.on_text(&text) {
                            SessionAction::Send(frame) => {
                                if let Err(e) = send_frame(&mut sink, &frame).await {
                                    self.deliver_error(e);
                                    break;
                                }
                            }
                            SessionAction::Data(data) => match (self.request.decode)(data) {
                                Ok(record) => self.deliver_event(record),
                                Err(e) => self.deliver_error(e),
                            },
                            SessionAction::Error(e) => self.deliver_error(e),
                            SessionAction::Completed => {
                                debug!(
                                    target: "subscription_client",
                                    operation,
                                    "Server completed subscription"
                                );
                            }
                            SessionAction::Ignore => {}
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let completed = session.state() == SessionState::Completed;
                        session.on_close();
                        if !completed {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "connection closed".to_string());
                            self.deliver_error(ClassifiedError::websocket(format!(
                                "WebSocket closed: {}",
                                reason
                            )));
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        session.on_close();
                        let error = ClassifiedError::websocket("WebSocket error").with_cause(e);
                        self.deliver_error(error);
                        break;
                    }
                    None => {
                        let completed = session.state() == SessionState::Completed;
                        session.on_close();
                        if !completed {
                            let error = ClassifiedError::websocket("WebSocket connection dropped");
                            self.deliver_error(error);
                        }
                        break;
                    }
                },
            }
        }

        debug!(target: "subscription_client", operation, "Subscription channel ended");
    }
}

fn build_request(url: &Url) -> Result<Request, ClassifiedError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| {
            ClassifiedError::websocket(format!("Invalid WebSocket URL {}", url)).with_cause(e)
        })?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
    Ok(request)
}

async fn send_frame<S>(sink: &mut S, frame: &ClientMessage) -> Result<(), ClassifiedError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = frame.to_text()?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| ClassifiedError::websocket("Failed to send frame").with_cause(e))
}
