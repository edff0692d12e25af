/// Request/response GraphQL client
///
/// One HTTP POST per call. The body is inspected for a GraphQL `errors` array
/// even when the HTTP exchange succeeds; only the first error is surfaced.
/// No retries, no timeout, no batching.
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::types::{GraphqlRequest, GraphqlResponse};
use crate::error::{ClassifiedError, ErrorCode};

/// Raw HTTP reply handed back by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// One HTTP POST of a JSON body
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &Url,
        body: &GraphqlRequest,
    ) -> Result<HttpReply, ClassifiedError>;
}

/// Production transport backed by reqwest
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &Url,
        body: &GraphqlRequest,
    ) -> Result<HttpReply, ClassifiedError> {
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ClassifiedError::transport(format!("Request to {} failed", url), e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClassifiedError::transport("Failed to read response body", e))?;

        Ok(HttpReply { status, body })
    }
}

/// GraphQL client for one-shot queries and mutations
#[derive(Clone)]
pub struct GraphqlClient {
    endpoint: Url,
    transport: Arc<dyn HttpTransport>,
}

impl GraphqlClient {
    pub fn new(endpoint: Url) -> Self {
        Self::with_transport(endpoint, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(endpoint: Url, transport: Arc<dyn HttpTransport>) -> Self {
        Self { endpoint, transport }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send a document and return the `data` field
    pub async fn send(
        &self,
        document: &str,
        variables: Option<Value>,
    ) -> Result<Value, ClassifiedError> {
        let request = GraphqlRequest::new(document, variables);
        debug!(target: "graphql_client", endpoint = %self.endpoint, "Sending GraphQL request");

        let reply = self.transport.post_json(&self.endpoint, &request).await.map_err(|e| {
            warn!(target: "graphql_client", error = %e, "GraphQL transport failure");
            e
        })?;

        interpret_reply(reply)
    }

    /// Send a document and decode `data` into `T`
    pub async fn query<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Option<Value>,
    ) -> Result<T, ClassifiedError> {
        let data = self.send(document, variables).await?;
        serde_json::from_value(data).map_err(ClassifiedError::decode)
    }
}

/// Map an HTTP reply to `data` or a classified error
pub fn interpret_reply(reply: HttpReply) -> Result<Value, ClassifiedError> {
    let success = (200..300).contains(&reply.status);
    let parsed = serde_json::from_str::<GraphqlResponse>(&reply.body);

    match parsed {
        Ok(body) => match body.into_result() {
            Err(err) => {
                debug!(
                    target: "graphql_client",
                    code = ?err.code(),
                    message = %err.message(),
                    "GraphQL error in response"
                );
                Err(err)
            }
            Ok(data) if success => Ok(data),
            Ok(_) => Err(status_error(reply.status)),
        },
        Err(e) if success => Err(ClassifiedError::decode(e)),
        Err(_) => Err(status_error(reply.status)),
    }
}

fn status_error(status: u16) -> ClassifiedError {
    let code = match status {
        400 => Some(ErrorCode::BadRequest),
        401 => Some(ErrorCode::Unauthorized),
        403 => Some(ErrorCode::Forbidden),
        500..=599 => Some(ErrorCode::InternalServerError),
        _ => None,
    };
    ClassifiedError::new(format!("HTTP {}", status), code)
}
