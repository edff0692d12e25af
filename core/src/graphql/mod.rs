// GraphQL request/response surface
pub mod client;
pub mod operations;
pub mod types;

pub use client::{GraphqlClient, HttpReply, HttpTransport, ReqwestTransport};
pub use operations::{ContainerAction, Operations};
pub use types::{GraphqlError, GraphqlRequest, GraphqlResponse};
