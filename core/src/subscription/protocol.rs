// graphql-transport-ws framing and per-socket session state
//
// One subscription per socket, always under id "1". The session is pure: it
// consumes inbound frames and tells the socket driver what to send or deliver.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ClassifiedError;
use crate::graphql::types::{GraphqlError, GraphqlRequest, GraphqlResponse};

pub const SUBPROTOCOL: &str = "graphql-transport-ws";
pub const SUBSCRIPTION_ID: &str = "1";

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        payload: Value,
    },
    Subscribe {
        id: String,
        payload: GraphqlRequest,
    },
    Complete {
        id: String,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl ClientMessage {
    pub fn connection_init() -> Self {
        ClientMessage::ConnectionInit { payload: json!({}) }
    }

    pub fn subscribe(request: GraphqlRequest) -> Self {
        ClientMessage::Subscribe {
            id: SUBSCRIPTION_ID.to_string(),
            payload: request,
        }
    }

    pub fn complete() -> Self {
        ClientMessage::Complete {
            id: SUBSCRIPTION_ID.to_string(),
        }
    }

    pub fn to_text(&self) -> Result<String, ClassifiedError> {
        serde_json::to_string(self).map_err(ClassifiedError::decode)
    }
}

/// `error` frame payload: the server may send an array or a bare object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Many(Vec<GraphqlError>),
    One(GraphqlError),
}

impl ErrorPayload {
    pub fn into_error(self) -> ClassifiedError {
        let first = match self {
            ErrorPayload::Many(errors) => errors.into_iter().next(),
            ErrorPayload::One(error) => Some(error),
        };
        match first {
            Some(error) => ClassifiedError::from_graphql(&error),
            None => ClassifiedError::new("Subscription failed", None),
        }
    }
}

/// Frames sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Next {
        #[serde(default)]
        id: Option<String>,
        payload: GraphqlResponse,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        payload: ErrorPayload,
    },
    Complete {
        #[serde(default)]
        id: Option<String>,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket not open yet
    Connecting,
    /// `connection_init` sent, waiting for `connection_ack`
    AwaitingAck,
    /// `subscribe` sent
    Streaming,
    /// Server sent `complete`
    Completed,
    /// Socket closed
    Closed,
}

/// What the socket driver should do with an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Send(ClientMessage),
    Data(Value),
    Error(ClassifiedError),
    Completed,
    Ignore,
}

/// State machine for one subscription over one socket
#[derive(Debug, Clone)]
pub struct ProtocolSession {
    state: SessionState,
    cancelled: bool,
    request: GraphqlRequest,
}

impl ProtocolSession {
    pub fn new(request: GraphqlRequest) -> Self {
        Self {
            state: SessionState::Connecting,
            cancelled: false,
            request,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn socket_open(&self) -> bool {
        matches!(
            self.state,
            SessionState::AwaitingAck | SessionState::Streaming | SessionState::Completed
        )
    }

    /// Socket opened: returns the `connection_init` frame
    pub fn on_open(&mut self) -> ClientMessage {
        self.state = SessionState::AwaitingAck;
        ClientMessage::connection_init()
    }

    pub fn on_close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Handle one text frame
    pub fn on_text(&mut self, text: &str) -> SessionAction {
        if self.cancelled {
            return SessionAction::Ignore;
        }
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => self.on_message(message),
            Err(e) => SessionAction::Error(ClassifiedError::decode(e)),
        }
    }

    pub fn on_message(&mut self, message: ServerMessage) -> SessionAction {
        if self.cancelled {
            return SessionAction::Ignore;
        }
        match message {
            ServerMessage::ConnectionAck { .. } => {
                if self.state != SessionState::AwaitingAck {
                    debug!(
                        target: "subscription_client",
                        state = ?self.state,
                        "Unexpected connection_ack"
                    );
                    return SessionAction::Ignore;
                }
                self.state = SessionState::Streaming;
                SessionAction::Send(ClientMessage::subscribe(self.request.clone()))
            }
            ServerMessage::Next { payload, .. } => match payload.into_result() {
                Ok(data) => SessionAction::Data(data),
                Err(e) => SessionAction::Error(e),
            },
            ServerMessage::Error { payload, .. } => SessionAction::Error(payload.into_error()),
            ServerMessage::Complete { .. } => {
                self.state = SessionState::Completed;
                SessionAction::Completed
            }
            ServerMessage::Ping { .. } => {
                SessionAction::Send(ClientMessage::Pong { payload: None })
            }
            ServerMessage::Pong { .. } => SessionAction::Ignore,
            ServerMessage::Unknown => {
                debug!(target: "subscription_client", "Ignoring unknown frame type");
                SessionAction::Ignore
            }
        }
    }

    /// Cancel the session. Returns the `complete` frame to send when the socket
    /// is open; `None` when it is not or when already cancelled.
    pub fn cancel(&mut self) -> Option<ClientMessage> {
        if self.cancelled {
            return None;
        }
        self.cancelled = true;
        if self.socket_open() {
            Some(ClientMessage::complete())
        } else {
            None
        }
    }
}
