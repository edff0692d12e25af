// Subscription transport (graphql-transport-ws over WebSocket)

pub mod client;
pub mod protocol;

pub use client::{SubscriptionClient, SubscriptionHandle, SubscriptionRequest};
pub use protocol::{
    ClientMessage, ErrorPayload, ProtocolSession, ServerMessage, SessionAction, SessionState,
    SUBPROTOCOL, SUBSCRIPTION_ID,
};

/// Anything that can tear down an open channel
pub trait ChannelHandle: Send + Sync {
    fn cancel(&self);
}
