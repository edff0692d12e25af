// Fleetwatch Core Library
// Streaming and reconciliation layer for a container-fleet dashboard

pub mod catalog;
pub mod config;
pub mod error;
pub mod graphql;
pub mod history;
pub mod streams;
pub mod subscription;
pub mod telemetry;

// Export core types
pub use catalog::{
    AgentHealthEvent, ContainerStatsEvent, LogEvent, NodeEvent, ServiceEvent, StackLogEvent,
};
pub use config::{ClientConfig, Endpoints};
pub use error::{classify, ClassifiedError, Classification, ErrorCode};
pub use graphql::{GraphqlClient, Operations};
pub use history::{RollingWindow, StatsSeries};
pub use streams::{
    ChannelState, KeyedSubscription, RegistryStats, StreamHub, SubscriptionGuard,
    SubscriptionRegistry,
};
pub use subscription::{SubscriptionClient, SubscriptionHandle, SubscriptionRequest};

pub type Result<T> = std::result::Result<T, ClassifiedError>;

/// Both transports plus the stream hub, built from one config
pub struct Fleetwatch {
    pub endpoints: Endpoints,
    pub operations: Operations,
    pub streams: StreamHub,
}

impl Fleetwatch {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoints = config.resolve()?;
        tracing::info!(
            http = %endpoints.http,
            ws = %endpoints.ws,
            "Starting Fleetwatch client"
        );

        let graphql = GraphqlClient::new(endpoints.http.clone());
        let subscriptions = SubscriptionClient::new(endpoints.ws.clone());

        Ok(Self {
            operations: Operations::new(graphql),
            streams: StreamHub::new(subscriptions),
            endpoints,
        })
    }

    /// Close every live channel
    pub fn shutdown(&self) {
        tracing::info!("Shutting down Fleetwatch client...");
        self.streams.clear_all();
    }
}
