//! Shared helpers for subscription tests
//!
//! A one-connection graphql-transport-ws server on 127.0.0.1 and a counting
//! channel handle for registry tests.

#![allow(dead_code)]

use fleetwatch_core::subscription::ChannelHandle;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use url::Url;

pub type ServerSocket = WebSocketStream<TcpStream>;

// =============================================================================
// WebSocket test server
// =============================================================================

/// Accept one connection, echo the requested sub-protocol, run `handler`
pub async fn spawn_ws_server<F, Fut>(handler: F) -> (Url, JoinHandle<()>)
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let echo_protocol = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            if let Some(proto) = req.headers().get("Sec-WebSocket-Protocol") {
                resp.headers_mut()
                    .insert("Sec-WebSocket-Protocol", proto.clone());
            }
            Ok(resp)
        };
        let ws = accept_hdr_async(stream, echo_protocol)
            .await
            .expect("handshake");
        handler(ws).await;
    });

    let url = Url::parse(&format!("ws://{}/ws", addr)).expect("url");
    (url, task)
}

/// Next text frame as JSON; `None` on close or error
pub async fn next_json(ws: &mut ServerSocket) -> Option<Value> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

pub async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::Text(value.to_string()))
        .await
        .expect("server send");
}

/// Read frames until the client goes away
pub async fn drain(ws: &mut ServerSocket) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Some(frame) = next_json(ws).await {
        frames.push(frame);
    }
    frames
}

// =============================================================================
// Counting channel handle
// =============================================================================

#[derive(Clone, Default)]
pub struct CountingHandle {
    cancels: Arc<AtomicUsize>,
}

impl CountingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl ChannelHandle for CountingHandle {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
