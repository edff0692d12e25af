// Container resource-usage telemetry

use serde::Deserialize;
use serde_json::{json, Value};

use super::records::ContainerStatsEvent;
use crate::error::ClassifiedError;
use crate::subscription::SubscriptionRequest;

pub const CONTAINER_STATS_SUBSCRIPTION: &str = r#"subscription ContainerStats($containerId: ID!) {
  containerStats(containerId: $containerId) {
    containerId
    timestamp
    cpuPercent
    memoryUsage
    memoryLimit
    memoryPercent
    networkRx
    networkTx
    blockRead
    blockWrite
    pids
  }
}"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsPayload {
    #[serde(default)]
    container_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    cpu_percent: Option<f64>,
    #[serde(default)]
    memory_usage: Option<u64>,
    #[serde(default)]
    memory_limit: Option<u64>,
    #[serde(default)]
    memory_percent: Option<f64>,
    #[serde(default)]
    network_rx: Option<u64>,
    #[serde(default)]
    network_tx: Option<u64>,
    #[serde(default)]
    block_read: Option<u64>,
    #[serde(default)]
    block_write: Option<u64>,
    #[serde(default)]
    pids: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerStatsData {
    container_stats: StatsPayload,
}

pub fn decode_container_stats(data: Value) -> Result<ContainerStatsEvent, ClassifiedError> {
    let data: ContainerStatsData = serde_json::from_value(data).map_err(ClassifiedError::decode)?;
    let p = data.container_stats;
    Ok(ContainerStatsEvent {
        container_id: p.container_id.unwrap_or_default(),
        timestamp: p.timestamp.unwrap_or_default(),
        cpu_percent: p.cpu_percent.unwrap_or(0.0),
        memory_usage: p.memory_usage.unwrap_or(0),
        memory_limit: p.memory_limit.unwrap_or(0),
        memory_percent: p.memory_percent.unwrap_or(0.0),
        network_rx: p.network_rx.unwrap_or(0),
        network_tx: p.network_tx.unwrap_or(0),
        block_read: p.block_read.unwrap_or(0),
        block_write: p.block_write.unwrap_or(0),
        pids: p.pids.unwrap_or(0),
    })
}

pub fn container_stats(container_id: &str) -> SubscriptionRequest<ContainerStatsEvent> {
    SubscriptionRequest {
        operation: "ContainerStats",
        query: CONTAINER_STATS_SUBSCRIPTION,
        variables: json!({ "containerId": container_id }),
        decode: decode_container_stats,
    }
}
