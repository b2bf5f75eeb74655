use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::catalog::ReferenceCatalog;
use super::economics::{EvolutionOutlook, evolution_outlook};
use super::error::{CoreError, CoreErrorCode};
use super::executor::{ExecutionConfig, PlanExecutor};
use super::selection::{SelectionConfig, select};
use super::service::InventoryService;
use super::snapshot::build_snapshot;
use super::types::{SelectionSet, Snapshot};

#[derive(Debug, Clone)]
pub struct Engine {
    catalog: ReferenceCatalog,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    snapshot: Snapshot,
}

/// Selection and economics computed from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub selection: SelectionSet,
    pub outlook: EvolutionOutlook,
}

impl Engine {
    pub fn new(catalog: ReferenceCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    pub fn open_payload(&self, payload: &JsonValue) -> Result<Session, CoreError> {
        let snapshot = build_snapshot(payload, &self.catalog)?;
        Ok(Session { snapshot })
    }

    pub fn open_service<S>(&self, service: &mut S) -> Result<Session, CoreError>
    where
        S: InventoryService + ?Sized,
    {
        let payload = service.fetch_inventory().map_err(|e| {
            CoreError::new(CoreErrorCode::Io, format!("failed to read inventory: {e}"))
        })?;
        self.open_payload(&payload)
    }
}

impl Session {
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn select(&self, config: &SelectionConfig) -> SelectionSet {
        select(&self.snapshot.individuals, config)
    }

    pub fn outlook(&self) -> EvolutionOutlook {
        evolution_outlook(&self.snapshot)
    }

    pub fn plan(&self, config: &SelectionConfig) -> Plan {
        Plan {
            selection: self.select(config),
            outlook: self.outlook(),
        }
    }

    pub fn executor(&self, plan: &Plan, config: ExecutionConfig) -> PlanExecutor {
        PlanExecutor::new(&self.snapshot, &plan.selection, &plan.outlook, config)
    }
}
