// Process-scoped owner of every live channel
//
// Holds the subscription client and one registry per event class. Consumers
// go through the hub; nothing else opens or closes channels.

use tracing::{debug, info};

use super::registry::{RegistryStats, SubscriptionGuard, SubscriptionRegistry};
use crate::catalog::{
    self, AgentHealthEvent, ContainerStatsEvent, LogEvent, NodeEvent, ServiceEvent, StackLogEvent,
};
use crate::config::ClientConfig;
use crate::error::ClassifiedError;
use crate::subscription::{SubscriptionClient, SubscriptionRequest};

#[derive(Clone)]
pub struct StreamHub {
    client: SubscriptionClient,
    container_logs: SubscriptionRegistry<LogEvent>,
    merged_logs: SubscriptionRegistry<LogEvent>,
    stack_logs: SubscriptionRegistry<StackLogEvent>,
    container_stats: SubscriptionRegistry<ContainerStatsEvent>,
    agent_health: SubscriptionRegistry<AgentHealthEvent>,
    service_events: SubscriptionRegistry<ServiceEvent>,
    node_events: SubscriptionRegistry<NodeEvent>,
}

impl StreamHub {
    pub fn new(client: SubscriptionClient) -> Self {
        Self {
            client,
            container_logs: SubscriptionRegistry::new("container_logs"),
            merged_logs: SubscriptionRegistry::new("merged_logs"),
            stack_logs: SubscriptionRegistry::new("stack_logs"),
            container_stats: SubscriptionRegistry::new("container_stats"),
            agent_health: SubscriptionRegistry::new("agent_health"),
            service_events: SubscriptionRegistry::new("service_events"),
            node_events: SubscriptionRegistry::new("node_events"),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClassifiedError> {
        let endpoints = config.resolve()?;
        info!(target: "stream_hub", ws = %endpoints.ws, "Stream hub configured");
        Ok(Self::new(SubscriptionClient::new(endpoints.ws)))
    }

    pub fn client(&self) -> &SubscriptionClient {
        &self.client
    }

    fn acquire<R>(
        &self,
        registry: &SubscriptionRegistry<R>,
        key: &str,
        request: SubscriptionRequest<R>,
    ) -> SubscriptionGuard<R>
    where
        R: Send + Sync + 'static,
    {
        let client = self.client.clone();
        registry.acquire(key, move |sink| {
            let errors = sink.clone();
            client.open(
                request,
                move |record| sink.on_event(record),
                move |error| errors.on_error(error),
            )
        })
    }

    pub fn container_logs(&self, container_id: &str) -> SubscriptionGuard<LogEvent> {
        self.acquire(
            &self.container_logs,
            container_id,
            catalog::container_logs(container_id),
        )
    }

    /// One channel for a set of containers, keyed order-insensitively.
    /// Blank ids are skipped; an empty set opens nothing and returns `None`.
    pub fn multi_container_logs(
        &self,
        container_ids: &[String],
    ) -> Option<SubscriptionGuard<LogEvent>> {
        let ids: Vec<String> = container_ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .cloned()
            .collect();
        if ids.is_empty() {
            debug!(target: "stream_hub", "No container ids; merged log channel not opened");
            return None;
        }
        let key = catalog::merged_key(&ids);
        Some(self.acquire(&self.merged_logs, &key, catalog::multi_container_logs(&ids)))
    }

    pub fn stack_logs(&self, stack_name: &str) -> SubscriptionGuard<StackLogEvent> {
        self.acquire(&self.stack_logs, stack_name, catalog::stack_logs(stack_name))
    }

    pub fn container_stats(&self, container_id: &str) -> SubscriptionGuard<ContainerStatsEvent> {
        self.acquire(
            &self.container_stats,
            container_id,
            catalog::container_stats(container_id),
        )
    }

    pub fn agent_health(&self, agent_id: &str) -> SubscriptionGuard<AgentHealthEvent> {
        self.acquire(&self.agent_health, agent_id, catalog::agent_health(agent_id))
    }

    pub fn service_events(&self, service_id: &str) -> SubscriptionGuard<ServiceEvent> {
        self.acquire(
            &self.service_events,
            service_id,
            catalog::service_events(service_id),
        )
    }

    pub fn node_events(&self, node_id: &str) -> SubscriptionGuard<NodeEvent> {
        self.acquire(&self.node_events, node_id, catalog::node_events(node_id))
    }

    pub fn container_logs_registry(&self) -> &SubscriptionRegistry<LogEvent> {
        &self.container_logs
    }

    pub fn container_stats_registry(&self) -> &SubscriptionRegistry<ContainerStatsEvent> {
        &self.container_stats
    }

    pub fn agent_health_registry(&self) -> &SubscriptionRegistry<AgentHealthEvent> {
        &self.agent_health
    }

    /// Per-registry statistics, keyed by registry name
    pub fn stats(&self) -> Vec<(&'static str, RegistryStats)> {
        vec![
            (self.container_logs.name(), self.container_logs.stats()),
            (self.merged_logs.name(), self.merged_logs.stats()),
            (self.stack_logs.name(), self.stack_logs.stats()),
            (self.container_stats.name(), self.container_stats.stats()),
            (self.agent_health.name(), self.agent_health.stats()),
            (self.service_events.name(), self.service_events.stats()),
            (self.node_events.name(), self.node_events.stats()),
        ]
    }

    /// Tear down every channel (logout, shutdown)
    pub fn clear_all(&self) {
        self.container_logs.clear_all();
        self.merged_logs.clear_all();
        self.stack_logs.clear_all();
        self.container_stats.clear_all();
        self.agent_health.clear_all();
        self.service_events.clear_all();
        self.node_events.clear_all();
        info!(target: "stream_hub", "All channels cleared");
    }
}
