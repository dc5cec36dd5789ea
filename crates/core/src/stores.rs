//! Storage interfaces the core depends on, plus in-memory
//! implementations for deterministic tests. Persistent backends live
//! in `storemind-db`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::action::{Action, ActionId, ActionStatus};
use crate::domain::alert::{Alert, AlertFilter, AlertId};
use crate::domain::execution::ExecutionRecord;
use crate::errors::StoreError;

#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn get(&self, id: &ActionId) -> Result<Option<Action>, StoreError>;
    async fn set_status(&self, id: &ActionId, status: ActionStatus) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn put(&self, alert: Alert) -> Result<(), StoreError>;
    async fn get(&self, id: &AlertId) -> Result<Option<Alert>, StoreError>;
    async fn update(&self, alert: Alert) -> Result<(), StoreError>;
    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError>;
}

/// Execution ledger keyed by `(action id, token fingerprint)`. Only
/// successful executions are recorded; the executor consults it before
/// dispatching so duplicate submissions replay instead of re-invoking
/// a connector.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    async fn find(
        &self,
        action_id: &ActionId,
        token_fingerprint: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError>;

    async fn record(&self, record: ExecutionRecord) -> Result<(), StoreError>;
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone, Default)]
pub struct InMemoryActionStore {
    actions: Arc<Mutex<HashMap<String, Action>>>,
}

impl InMemoryActionStore {
    pub fn with_actions(actions: Vec<Action>) -> Self {
        let store = Self::default();
        {
            let mut guard = lock_or_recover(&store.actions);
            for action in actions {
                guard.insert(action.id.0.clone(), action);
            }
        }
        store
    }

    pub fn insert(&self, action: Action) {
        lock_or_recover(&self.actions).insert(action.id.0.clone(), action);
    }
}

#[async_trait]
impl ActionStore for InMemoryActionStore {
    async fn get(&self, id: &ActionId) -> Result<Option<Action>, StoreError> {
        Ok(lock_or_recover(&self.actions).get(&id.0).cloned())
    }

    async fn set_status(&self, id: &ActionId, status: ActionStatus) -> Result<(), StoreError> {
        let mut guard = lock_or_recover(&self.actions);
        let action = guard
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Unavailable(format!("action `{}` missing", id.0)))?;
        action.status = status;
        action.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAlertStore {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn put(&self, alert: Alert) -> Result<(), StoreError> {
        lock_or_recover(&self.alerts).push(alert);
        Ok(())
    }

    async fn get(&self, id: &AlertId) -> Result<Option<Alert>, StoreError> {
        Ok(lock_or_recover(&self.alerts).iter().find(|alert| &alert.id == id).cloned())
    }

    async fn update(&self, alert: Alert) -> Result<(), StoreError> {
        let mut guard = lock_or_recover(&self.alerts);
        let slot = guard
            .iter_mut()
            .find(|candidate| candidate.id == alert.id)
            .ok_or_else(|| StoreError::Unavailable(format!("alert `{}` missing", alert.id.0)))?;
        *slot = alert;
        Ok(())
    }

    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let guard = lock_or_recover(&self.alerts);
        let mut matched: Vec<Alert> =
            guard.iter().filter(|alert| filter.matches(alert)).cloned().collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryExecutionLedger {
    records: Arc<Mutex<HashMap<(String, String), ExecutionRecord>>>,
}

impl InMemoryExecutionLedger {
    pub fn len(&self) -> usize {
        lock_or_recover(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExecutionLedger for InMemoryExecutionLedger {
    async fn find(
        &self,
        action_id: &ActionId,
        token_fingerprint: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        let key = (action_id.0.clone(), token_fingerprint.to_string());
        Ok(lock_or_recover(&self.records).get(&key).cloned())
    }

    async fn record(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        let key = (record.action_id.0.clone(), record.token_fingerprint.clone());
        lock_or_recover(&self.records).insert(key, record);
        Ok(())
    }
}
