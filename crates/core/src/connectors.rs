//! Connector capabilities, one per action type.
//!
//! A connector is the external integration that actually performs an
//! action's effect (pricing, scheduling, or inventory system). The
//! executor holds one capability per [`ActionType`] and dispatches
//! through the registry; swapping a connector never touches executor
//! logic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::action::{Action, ActionType};
use crate::domain::execution::ExecutionId;

/// Proof of a completed external effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectorReceipt {
    pub execution_id: ExecutionId,
    pub executed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("connector rejected the action: {0}")]
    Rejected(String),
    #[error("connector unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ActionConnector: Send + Sync {
    async fn invoke(
        &self,
        action: &Action,
        params: &serde_json::Value,
    ) -> Result<ConnectorReceipt, ConnectorError>;
}

/// Dispatch table over the closed action-type enum. Adding a new kind
/// of action means adding a variant and registering its handler here.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<ActionType, Arc<dyn ActionConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        action_type: ActionType,
        connector: Arc<dyn ActionConnector>,
    ) -> Self {
        self.connectors.insert(action_type, connector);
        self
    }

    pub fn get(&self, action_type: &ActionType) -> Option<Arc<dyn ActionConnector>> {
        self.connectors.get(action_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::domain::action::{Action, ActionType};
    use crate::domain::execution::ExecutionId;

    use super::{ActionConnector, ConnectorError, ConnectorReceipt, ConnectorRegistry};

    struct StaticConnector(&'static str);

    #[async_trait]
    impl ActionConnector for StaticConnector {
        async fn invoke(
            &self,
            _action: &Action,
            _params: &serde_json::Value,
        ) -> Result<ConnectorReceipt, ConnectorError> {
            Ok(ConnectorReceipt {
                execution_id: ExecutionId(self.0.to_string()),
                executed_at: Utc::now(),
            })
        }
    }

    #[test]
    fn registry_resolves_connector_by_action_type() {
        let registry = ConnectorRegistry::new()
            .register(ActionType::PriceChange, Arc::new(StaticConnector("pricing")));

        assert!(registry.get(&ActionType::PriceChange).is_some());
        assert!(registry.get(&ActionType::ScheduleUpdate).is_none());
    }
}
