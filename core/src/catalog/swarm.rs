// Swarm service and node events

use serde::Deserialize;
use serde_json::{json, Value};

use super::records::{NodeEvent, ServiceEvent};
use super::upper_or;
use crate::error::ClassifiedError;
use crate::subscription::SubscriptionRequest;

pub const SERVICE_EVENTS_SUBSCRIPTION: &str = r#"subscription ServiceEvents($serviceId: ID!) {
  serviceEvents(serviceId: $serviceId) {
    serviceId
    serviceName
    action
    replicasRunning
    replicasDesired
    timestamp
    message
  }
}"#;

pub const NODE_EVENTS_SUBSCRIPTION: &str = r#"subscription NodeEvents($nodeId: ID!) {
  nodeEvents(nodeId: $nodeId) {
    nodeId
    hostname
    role
    status
    availability
    timestamp
    message
  }
}"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServicePayload {
    #[serde(default)]
    service_id: Option<String>,
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    replicas_running: Option<u64>,
    #[serde(default)]
    replicas_desired: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceEventsData {
    service_events: ServicePayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodePayload {
    #[serde(default)]
    node_id: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    availability: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeEventsData {
    node_events: NodePayload,
}

pub fn decode_service_event(data: Value) -> Result<ServiceEvent, ClassifiedError> {
    let data: ServiceEventsData = serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    let p = data.service_events;
    Ok(ServiceEvent {
        service_id: p.service_id.unwrap_or_default(),
        service_name: p.service_name.unwrap_or_default(),
        action: p.action.unwrap_or_default(),
        replicas_running: p.replicas_running.unwrap_or(0),
        replicas_desired: p.replicas_desired.unwrap_or(0),
        timestamp: p.timestamp.unwrap_or_default(),
        message: p.message,
    })
}

pub fn decode_node_event(data: Value) -> Result<NodeEvent, ClassifiedError> {
    let data: NodeEventsData = serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    let p = data.node_events;
    Ok(NodeEvent {
        node_id: p.node_id.unwrap_or_default(),
        hostname: p.hostname.unwrap_or_default(),
        role: p.role.unwrap_or_default(),
        status: upper_or(p.status, "UNKNOWN"),
        availability: upper_or(p.availability, "UNKNOWN"),
        timestamp: p.timestamp.unwrap_or_default(),
        message: p.message,
    })
}

pub fn service_events(service_id: &str) -> SubscriptionRequest<ServiceEvent> {
    SubscriptionRequest {
        operation: "ServiceEvents",
        query: SERVICE_EVENTS_SUBSCRIPTION,
        variables: json!({ "serviceId": service_id }),
        decode: decode_service_event,
    }
}

pub fn node_events(node_id: &str) -> SubscriptionRequest<NodeEvent> {
    SubscriptionRequest {
        operation: "NodeEvents",
        query: NODE_EVENTS_SUBSCRIPTION,
        variables: json!({ "nodeId": node_id }),
        decode: decode_node_event,
    }
}
