use async_trait::async_trait;
use fleetwatch_core::error::{ClassifiedError, ErrorCode};
use fleetwatch_core::graphql::{GraphqlClient, GraphqlRequest, HttpReply, HttpTransport, Operations};
use serde_json::json;
use std::sync::{Arc, Mutex};
use url::Url;

/// Transport replying with a canned body and recording requests
struct CannedTransport {
    reply: HttpReply,
    seen: Mutex<Vec<GraphqlRequest>>,
}

impl CannedTransport {
    fn new(status: u16, body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            reply: HttpReply {
                status,
                body: body.to_string(),
            },
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<GraphqlRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for CannedTransport {
    async fn post_json(
        &self,
        _url: &Url,
        body: &GraphqlRequest,
    ) -> Result<HttpReply, ClassifiedError> {
        self.seen.lock().unwrap().push(body.clone());
        Ok(self.reply.clone())
    }
}

struct FailingTransport;

#[async_trait]
impl HttpTransport for FailingTransport {
    async fn post_json(
        &self,
        _url: &Url,
        _body: &GraphqlRequest,
    ) -> Result<HttpReply, ClassifiedError> {
        Err(ClassifiedError::transport(
            "connection refused",
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        ))
    }
}

fn endpoint() -> Url {
    Url::parse("http://localhost:8080/graphql").unwrap()
}

#[tokio::test]
async fn only_the_first_graphql_error_is_surfaced() {
    let transport = CannedTransport::new(
        200,
        json!({
            "data": null,
            "errors": [
                {"message": "agent offline", "extensions": {"code": "AGENT_UNAVAILABLE"}},
                {"message": "forbidden", "extensions": {"code": "FORBIDDEN"}}
            ]
        }),
    );
    let client = GraphqlClient::with_transport(endpoint(), transport);

    let err = client.send("query { containers { id } }", None).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AgentUnavailable));
    assert_eq!(err.message(), "agent offline");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn request_carries_query_and_variables() {
    let transport = CannedTransport::new(200, json!({"data": {"ok": true}}));
    let client = GraphqlClient::with_transport(endpoint(), transport.clone());

    let data = client
        .send("query C($id: ID!) { container(id: $id) { id } }", Some(json!({"id": "c1"})))
        .await
        .unwrap();
    assert_eq!(data, json!({"ok": true}));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query, "query C($id: ID!) { container(id: $id) { id } }");
    assert_eq!(requests[0].variables, Some(json!({"id": "c1"})));
}

#[tokio::test]
async fn error_without_extensions_has_no_code() {
    let transport = CannedTransport::new(200, json!({"errors": [{"message": "boom"}]}));
    let client = GraphqlClient::with_transport(endpoint(), transport);

    let err = client.send("{ x }", None).await.unwrap_err();
    assert_eq!(err.code(), None);
    assert_eq!(err.user_message(), "boom");
}

#[tokio::test]
async fn transport_failures_propagate() {
    let client = GraphqlClient::with_transport(endpoint(), Arc::new(FailingTransport));
    let err = client.send("{ x }", None).await.unwrap_err();
    assert_eq!(err.message(), "connection refused");
    assert!(err.cause().is_some());
}

#[tokio::test]
async fn operations_decode_typed_results() {
    let transport = CannedTransport::new(
        200,
        json!({"data": {"containers": [
            {"id": "c1", "name": "web", "image": "nginx:1.25", "state": "running", "status": "Up 2 hours", "agentId": "a1"},
            {"id": "c2", "name": "db"}
        ]}}),
    );
    let ops = Operations::new(GraphqlClient::with_transport(endpoint(), transport));

    let containers = ops.containers().await.unwrap();
    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0].agent_id.as_deref(), Some("a1"));
    assert_eq!(containers[1].image, "");
}

#[tokio::test]
async fn mutations_send_their_variables() {
    let transport = CannedTransport::new(
        200,
        json!({"data": {"scaleService": {"id": "s1", "name": "api", "replicas": 5}}}),
    );
    let ops = Operations::new(GraphqlClient::with_transport(endpoint(), transport.clone()));

    let scaled = ops.scale_service("s1", 5).await.unwrap();
    assert_eq!(scaled.replicas, 5);
    assert_eq!(
        transport.requests()[0].variables,
        Some(json!({"id": "s1", "replicas": 5}))
    );
}

#[tokio::test]
async fn container_action_not_found_is_permanent() {
    let transport = CannedTransport::new(
        200,
        json!({"errors": [{"message": "no such container", "extensions": {"code": "CONTAINER_NOT_FOUND"}}]}),
    );
    let ops = Operations::new(GraphqlClient::with_transport(endpoint(), transport.clone()));

    let err = ops.restart_container("gone").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_retryable());
    assert_eq!(
        transport.requests()[0].variables,
        Some(json!({"id": "gone", "action": "RESTART"}))
    );
}
