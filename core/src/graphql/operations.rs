/// Typed one-shot queries and control-plane mutations
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::client::GraphqlClient;
use crate::error::ClassifiedError;

pub const CONTAINERS_QUERY: &str = r#"query Containers {
  containers {
    id
    name
    image
    state
    status
    agentId
  }
}"#;

pub const AGENTS_QUERY: &str = r#"query Agents {
  agents {
    id
    name
    address
    status
  }
}"#;

pub const CONTAINER_ACTION_MUTATION: &str = r#"mutation ContainerAction($id: ID!, $action: ContainerAction!) {
  containerAction(id: $id, action: $action) {
    id
    state
  }
}"#;

pub const SCALE_SERVICE_MUTATION: &str = r#"mutation ScaleService($id: ID!, $replicas: Int!) {
  scaleService(id: $id, replicas: $replicas) {
    id
    name
    replicas
  }
}"#;

pub const DRAIN_NODE_MUTATION: &str = r#"mutation DrainNode($id: ID!) {
  updateNodeAvailability(id: $id, availability: DRAIN) {
    id
    availability
  }
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub id: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceScale {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub replicas: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAvailability {
    pub id: String,
    #[serde(default)]
    pub availability: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "START",
            ContainerAction::Stop => "STOP",
            ContainerAction::Restart => "RESTART",
        }
    }
}

#[derive(Deserialize)]
struct ContainersData {
    containers: Vec<ContainerSummary>,
}

#[derive(Deserialize)]
struct AgentsData {
    agents: Vec<AgentSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerActionData {
    container_action: ContainerState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleServiceData {
    scale_service: ServiceScale,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrainNodeData {
    update_node_availability: NodeAvailability,
}

/// Thin typed wrappers; each call is exactly one request
#[derive(Clone)]
pub struct Operations {
    client: GraphqlClient,
}

impl Operations {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }

    pub async fn containers(&self) -> Result<Vec<ContainerSummary>, ClassifiedError> {
        let data: ContainersData = self.client.query(CONTAINERS_QUERY, None).await?;
        Ok(data.containers)
    }

    pub async fn agents(&self) -> Result<Vec<AgentSummary>, ClassifiedError> {
        let data: AgentsData = self.client.query(AGENTS_QUERY, None).await?;
        Ok(data.agents)
    }

    pub async fn container_action(
        &self,
        id: &str,
        action: ContainerAction,
    ) -> Result<ContainerState, ClassifiedError> {
        let vars = json!({ "id": id, "action": action.as_str() });
        let data: ContainerActionData = self
            .client
            .query(CONTAINER_ACTION_MUTATION, Some(vars))
            .await?;
        Ok(data.container_action)
    }

    pub async fn start_container(&self, id: &str) -> Result<ContainerState, ClassifiedError> {
        self.container_action(id, ContainerAction::Start).await
    }

    pub async fn stop_container(&self, id: &str) -> Result<ContainerState, ClassifiedError> {
        self.container_action(id, ContainerAction::Stop).await
    }

    pub async fn restart_container(&self, id: &str) -> Result<ContainerState, ClassifiedError> {
        self.container_action(id, ContainerAction::Restart).await
    }

    pub async fn scale_service(
        &self,
        id: &str,
        replicas: u64,
    ) -> Result<ServiceScale, ClassifiedError> {
        let vars = json!({ "id": id, "replicas": replicas });
        let data: ScaleServiceData = self.client.query(SCALE_SERVICE_MUTATION, Some(vars)).await?;
        Ok(data.scale_service)
    }

    pub async fn drain_node(&self, id: &str) -> Result<NodeAvailability, ClassifiedError> {
        let data: DrainNodeData = self
            .client
            .query(DRAIN_NODE_MUTATION, Some(json!({ "id": id })))
            .await?;
        Ok(data.update_node_availability)
    }
}
