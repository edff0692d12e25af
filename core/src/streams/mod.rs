// Reactive subscription layer: registry, hub, consumer bindings

pub mod hub;
pub mod lifecycle;
pub mod registry;

pub use hub::StreamHub;
pub use lifecycle::KeyedSubscription;
pub use registry::{
    ChannelSink, ChannelState, RegistryStats, SubscriptionGuard, SubscriptionRegistry,
};
