// Agent health heartbeats

use serde::Deserialize;
use serde_json::{json, Value};

use super::records::AgentHealthEvent;
use super::upper_or;
use crate::error::ClassifiedError;
use crate::subscription::SubscriptionRequest;

pub const AGENT_HEALTH_SUBSCRIPTION: &str = r#"subscription AgentHealth($agentId: ID!) {
  agentHealth(agentId: $agentId) {
    agentId
    status
    timestamp
    containerCount
    message
    lastSeen
  }
}"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthPayload {
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    container_count: Option<u64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    last_seen: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentHealthData {
    agent_health: HealthPayload,
}

pub fn decode_agent_health(data: Value) -> Result<AgentHealthEvent, ClassifiedError> {
    let data: AgentHealthData = serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    let p = data.agent_health;
    Ok(AgentHealthEvent {
        agent_id: p.agent_id.unwrap_or_default(),
        status: upper_or(p.status, "UNKNOWN"),
        timestamp: p.timestamp.unwrap_or_default(),
        container_count: p.container_count.unwrap_or(0),
        message: p.message,
        last_seen: p.last_seen,
    })
}

pub fn agent_health(agent_id: &str) -> SubscriptionRequest<AgentHealthEvent> {
    SubscriptionRequest {
        operation: "AgentHealth",
        query: AGENT_HEALTH_SUBSCRIPTION,
        variables: json!({ "agentId": agent_id }),
        decode: decode_agent_health,
    }
}
