use serde_json::Value as JsonValue;
use thiserror::Error;

use super::types::CreatureId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rejected by remote: {0}")]
    Rejected(String),
}

/// The remote inventory as the planner sees it. Implementations own the
/// transport, authentication and any retry policy.
pub trait InventoryService {
    /// Reads the raw inventory payload.
    fn fetch_inventory(&mut self) -> Result<JsonValue, ServiceError>;

    /// Evolves one individual in place. Returns once the remote confirmed it.
    fn evolve(&mut self, id: CreatureId) -> Result<(), ServiceError>;

    /// Transfers one individual away. This can not be undone.
    fn release(&mut self, id: CreatureId) -> Result<(), ServiceError>;
}
