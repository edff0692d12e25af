// Subscription catalog
//
// One request builder per event class: document, variables, and payload
// decoder. Opening is left to the SubscriptionClient (via the registry).

pub mod health;
pub mod logs;
pub mod records;
pub mod stats;
pub mod swarm;

pub use health::agent_health;
pub use logs::{container_logs, merge_by_timestamp, merged_key, multi_container_logs, stack_logs};
pub use records::{
    AgentHealthEvent, ContainerStatsEvent, LogEvent, NodeEvent, ServiceEvent, StackLogEvent,
    Timestamped,
};
pub use stats::container_stats;
pub use swarm::{node_events, service_events};

/// Upper-case a wire string, or use the default when absent/blank
fn upper_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| default.to_string())
}
