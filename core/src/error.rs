// Classified backend errors
//
// Every failure the core hands to a caller is a ClassifiedError: a message plus
// an optional code from the backend's closed vocabulary. Classification and the
// user-facing sentence are pure functions of the code.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::graphql::types::GraphqlError;

/// Closed set of error codes the backend may put in `extensions.code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ContainerNotFound,
    AgentNotFound,
    AgentUnavailable,
    Unauthorized,
    Forbidden,
    BadRequest,
    InternalServerError,
    GrpcError,
    WebsocketError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::ContainerNotFound,
        ErrorCode::AgentNotFound,
        ErrorCode::AgentUnavailable,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::BadRequest,
        ErrorCode::InternalServerError,
        ErrorCode::GrpcError,
        ErrorCode::WebsocketError,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ContainerNotFound => "CONTAINER_NOT_FOUND",
            ErrorCode::AgentNotFound => "AGENT_NOT_FOUND",
            ErrorCode::AgentUnavailable => "AGENT_UNAVAILABLE",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::GrpcError => "GRPC_ERROR",
            ErrorCode::WebsocketError => "WEBSOCKET_ERROR",
        }
    }

    /// Fixed human sentence shown for this code
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::ContainerNotFound => {
                "The container could not be found. It may have been removed."
            }
            ErrorCode::AgentNotFound => {
                "The agent could not be found. It may have been deregistered."
            }
            ErrorCode::AgentUnavailable => {
                "The agent is currently unavailable. Please try again shortly."
            }
            ErrorCode::Unauthorized => "You are not signed in. Please authenticate and try again.",
            ErrorCode::Forbidden => "You do not have permission to perform this action.",
            ErrorCode::BadRequest => "The request was invalid.",
            ErrorCode::InternalServerError => {
                "The server encountered an internal error. Please try again."
            }
            ErrorCode::GrpcError => "Communication with the agent failed. Please try again.",
            ErrorCode::WebsocketError => "The live connection to the server was lost.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

/// Predicate set derived from an error code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_not_found: bool,
    pub is_unavailable: bool,
    pub is_unauthorized: bool,
    pub is_forbidden: bool,
    pub is_internal: bool,
    pub is_bad_request: bool,
    pub is_retryable: bool,
}

/// Classify an (optional) error code. Absent codes classify as nothing.
pub fn classify(code: Option<ErrorCode>) -> Classification {
    let Some(code) = code else {
        return Classification::default();
    };
    Classification {
        is_not_found: matches!(code, ErrorCode::ContainerNotFound | ErrorCode::AgentNotFound),
        is_unavailable: code == ErrorCode::AgentUnavailable,
        is_unauthorized: code == ErrorCode::Unauthorized,
        is_forbidden: code == ErrorCode::Forbidden,
        is_internal: code == ErrorCode::InternalServerError,
        is_bad_request: code == ErrorCode::BadRequest,
        is_retryable: matches!(
            code,
            ErrorCode::AgentUnavailable
                | ErrorCode::GrpcError
                | ErrorCode::InternalServerError
                | ErrorCode::WebsocketError
        ),
    }
}

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Error value handed to callers of the request/response and subscription clients
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    message: String,
    code: Option<ErrorCode>,
    #[source]
    cause: Option<Cause>,
}

impl ClassifiedError {
    pub fn new(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self {
            message: message.into(),
            code,
            cause: None,
        }
    }

    /// Build from a raw wire code; unknown codes are dropped to `None`
    pub fn with_raw_code(message: impl Into<String>, raw_code: Option<&str>) -> Self {
        let code = raw_code.and_then(|c| match c.parse::<ErrorCode>() {
            Ok(code) => Some(code),
            Err(e) => {
                tracing::debug!(target: "error", error = %e, "Unclassified backend error code");
                None
            }
        });
        Self::new(message, code)
    }

    pub fn from_graphql(error: &GraphqlError) -> Self {
        Self::with_raw_code(error.message.clone(), error.code())
    }

    /// Fixed socket-level failure
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::new(message, Some(ErrorCode::WebsocketError))
    }

    /// Transport failure without a backend code
    pub fn transport<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(message, None).with_cause(cause)
    }

    /// Payload that did not match the expected record shape
    pub fn decode(err: serde_json::Error) -> Self {
        Self::new(format!("Malformed payload: {}", err), None).with_cause(err)
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn classify(&self) -> Classification {
        classify(self.code)
    }

    pub fn is_not_found(&self) -> bool {
        self.classify().is_not_found
    }

    pub fn is_unavailable(&self) -> bool {
        self.classify().is_unavailable
    }

    pub fn is_unauthorized(&self) -> bool {
        self.classify().is_unauthorized
    }

    pub fn is_forbidden(&self) -> bool {
        self.classify().is_forbidden
    }

    pub fn is_internal(&self) -> bool {
        self.classify().is_internal
    }

    pub fn is_bad_request(&self) -> bool {
        self.classify().is_bad_request
    }

    pub fn is_retryable(&self) -> bool {
        self.classify().is_retryable
    }

    /// Sentence for display. Falls back to the raw message for absent codes.
    pub fn user_message(&self) -> String {
        match self.code {
            Some(code) => code.user_message().to_string(),
            None => self.message.clone(),
        }
    }
}

impl PartialEq for ClassifiedError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.code == other.code
    }
}
