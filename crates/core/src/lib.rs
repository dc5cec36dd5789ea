pub mod alerts;
pub mod approvals;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod connectors;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod stores;
pub mod sync;
pub mod telemetry;

pub use alerts::{
    AlertLifecycleManager, ChannelDelivery, DeliveryStatus, DismissReceipt, NewAlert,
    NotificationDispatcher,
};
pub use approvals::{
    ApprovalDecision, ApprovalDenial, ApprovalGate, ApprovalToken, TokenIssueError, TokenIssuer,
};
pub use audit::{AuditOutcome, AuditRecord, AuditSink, InMemoryAuditSink};
pub use classifier::{ClassifierRules, Mode, ModeClassifier};
pub use connectors::{ActionConnector, ConnectorError, ConnectorReceipt, ConnectorRegistry};
pub use domain::action::{Action, ActionId, ActionStatus, ActionType};
pub use domain::alert::{
    Alert, AlertFilter, AlertId, AlertPriority, AlertStatus, NotificationChannel,
};
pub use domain::execution::{ExecutionId, ExecutionRecord, ExecutionResult};
pub use errors::{AlertError, ExecuteFailure, StoreError};
pub use executor::{ActionExecutor, ExecutorConfig};
pub use stores::{
    ActionStore, AlertStore, ExecutionLedger, InMemoryActionStore, InMemoryAlertStore,
    InMemoryExecutionLedger,
};
