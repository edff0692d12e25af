//! Decoded event records, one per event class
//!
//! Every record is flat and fully typed. Optional arrays decode to empty
//! vectors, `line_count` defaults to 1, and level/status strings are
//! upper-cased at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Records carrying the backend's own timestamp
pub trait Timestamped {
    fn timestamp(&self) -> &str;

    /// RFC 3339 timestamp, if it parses
    fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.timestamp())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub container_id: String,
    pub container_name: Option<String>,
    pub agent_id: Option<String>,
    pub timestamp: String,
    pub content: String,
    pub level: String,
    pub stream: Option<String>,
    pub grouped_lines: Vec<String>,
    pub line_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackLogEvent {
    pub stack_name: String,
    pub service_name: String,
    pub container_id: String,
    pub timestamp: String,
    pub content: String,
    pub level: String,
    pub grouped_lines: Vec<String>,
    pub line_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatsEvent {
    pub container_id: String,
    pub timestamp: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub block_read: u64,
    pub block_write: u64,
    pub pids: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealthEvent {
    pub agent_id: String,
    pub status: String,
    pub timestamp: String,
    pub container_count: u64,
    pub message: Option<String>,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub service_id: String,
    pub service_name: String,
    pub action: String,
    pub replicas_running: u64,
    pub replicas_desired: u64,
    pub timestamp: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub node_id: String,
    pub hostname: String,
    pub role: String,
    pub status: String,
    pub availability: String,
    pub timestamp: String,
    pub message: Option<String>,
}

macro_rules! impl_timestamped {
    ($($ty:ty),*) => {
        $(impl Timestamped for $ty {
            fn timestamp(&self) -> &str {
                &self.timestamp
            }
        })*
    };
}

impl_timestamped!(
    LogEvent,
    StackLogEvent,
    ContainerStatsEvent,
    AgentHealthEvent,
    ServiceEvent,
    NodeEvent
);
