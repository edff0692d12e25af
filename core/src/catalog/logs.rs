// Log subscriptions: single container, several containers merged, whole stack

use serde::Deserialize;
use serde_json::{json, Value};

use super::records::{LogEvent, StackLogEvent, Timestamped};
use super::upper_or;
use crate::error::ClassifiedError;
use crate::subscription::SubscriptionRequest;

pub const CONTAINER_LOGS_SUBSCRIPTION: &str = r#"subscription ContainerLogs($containerId: ID!) {
  logStream(containerId: $containerId) {
    containerId
    containerName
    agentId
    timestamp
    content
    level
    stream
    groupedLines
    lineCount
  }
}"#;

pub const MULTI_CONTAINER_LOGS_SUBSCRIPTION: &str = r#"subscription MultiContainerLogs($containerIds: [ID!]!) {
  multiContainerLogs(containerIds: $containerIds) {
    containerId
    containerName
    agentId
    timestamp
    content
    level
    stream
    groupedLines
    lineCount
  }
}"#;

pub const STACK_LOGS_SUBSCRIPTION: &str = r#"subscription StackLogs($stackName: String!) {
  stackLogs(stackName: $stackName) {
    stackName
    serviceName
    containerId
    timestamp
    content
    level
    groupedLines
    lineCount
  }
}"#;

const DEFAULT_LEVEL: &str = "INFO";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogPayload {
    #[serde(default)]
    container_id: Option<String>,
    #[serde(default)]
    container_name: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    stream: Option<String>,
    #[serde(default)]
    grouped_lines: Option<Vec<String>>,
    #[serde(default)]
    line_count: Option<u32>,
}

impl From<LogPayload> for LogEvent {
    fn from(p: LogPayload) -> Self {
        LogEvent {
            container_id: p.container_id.unwrap_or_default(),
            container_name: p.container_name,
            agent_id: p.agent_id,
            timestamp: p.timestamp.unwrap_or_default(),
            content: p.content.unwrap_or_default(),
            level: upper_or(p.level, DEFAULT_LEVEL),
            stream: p.stream,
            grouped_lines: p.grouped_lines.unwrap_or_default(),
            line_count: p.line_count.unwrap_or(1),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreamData {
    log_stream: LogPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiContainerLogsData {
    multi_container_logs: LogPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackLogPayload {
    #[serde(default)]
    stack_name: Option<String>,
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default)]
    container_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    grouped_lines: Option<Vec<String>>,
    #[serde(default)]
    line_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackLogsData {
    stack_logs: StackLogPayload,
}

pub fn decode_log_stream(data: Value) -> Result<LogEvent, ClassifiedError> {
    let data: LogStreamData = serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    Ok(data.log_stream.into())
}

pub fn decode_multi_container_logs(data: Value) -> Result<LogEvent, ClassifiedError> {
    let data: MultiContainerLogsData =
        serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    Ok(data.multi_container_logs.into())
}

pub fn decode_stack_logs(data: Value) -> Result<StackLogEvent, ClassifiedError> {
    let data: StackLogsData = serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    let p = data.stack_logs;
    Ok(StackLogEvent {
        stack_name: p.stack_name.unwrap_or_default(),
        service_name: p.service_name.unwrap_or_default(),
        container_id: p.container_id.unwrap_or_default(),
        timestamp: p.timestamp.unwrap_or_default(),
        content: p.content.unwrap_or_default(),
        level: upper_or(p.level, DEFAULT_LEVEL),
        grouped_lines: p.grouped_lines.unwrap_or_default(),
        line_count: p.line_count.unwrap_or(1),
    })
}

/// Tail one container's log
pub fn container_logs(container_id: &str) -> SubscriptionRequest<LogEvent> {
    SubscriptionRequest {
        operation: "ContainerLogs",
        query: CONTAINER_LOGS_SUBSCRIPTION,
        variables: json!({ "containerId": container_id }),
        decode: decode_log_stream,
    }
}

/// Tail several containers over one channel
pub fn multi_container_logs(container_ids: &[String]) -> SubscriptionRequest<LogEvent> {
    SubscriptionRequest {
        operation: "MultiContainerLogs",
        query: MULTI_CONTAINER_LOGS_SUBSCRIPTION,
        variables: json!({ "containerIds": container_ids }),
        decode: decode_multi_container_logs,
    }
}

/// Tail every service of a Swarm stack
pub fn stack_logs(stack_name: &str) -> SubscriptionRequest<StackLogEvent> {
    SubscriptionRequest {
        operation: "StackLogs",
        query: STACK_LOGS_SUBSCRIPTION,
        variables: json!({ "stackName": stack_name }),
        decode: decode_stack_logs,
    }
}

/// Registry key for a set of containers; order-insensitive
pub fn merged_key(container_ids: &[String]) -> String {
    let mut ids: Vec<&str> = container_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.join(",")
}

/// Order records from independent channels by their own timestamps.
/// Stable; records whose timestamp does not parse go last.
pub fn merge_by_timestamp<T: Timestamped>(mut records: Vec<T>) -> Vec<T> {
    records.sort_by_cached_key(|r| {
        let ts = r.timestamp_utc();
        (ts.is_none(), ts)
    });
    records
}
