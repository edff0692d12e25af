/// GraphQL wire types shared by the HTTP and WebSocket transports
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClassifiedError;

/// Request body: `{query, variables}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>, variables: Option<Value>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

/// One entry of a GraphQL `errors` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
}

impl GraphqlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

/// Response body: `{data?, errors?}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

impl GraphqlResponse {
    /// First error of a non-empty `errors` array. Later entries are not surfaced.
    pub fn first_error(&self) -> Option<&GraphqlError> {
        self.errors.as_ref().and_then(|errors| errors.first())
    }

    /// `data` on success, the first error classified otherwise
    pub fn into_result(self) -> Result<Value, ClassifiedError> {
        if let Some(err) = self.first_error() {
            return Err(ClassifiedError::from_graphql(err));
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}
