mod catalog;
mod economics;
mod engine;
mod error;
mod executor;
mod selection;
mod service;
mod snapshot;
mod types;

pub use catalog::{COSTS_FILE, FAMILIES_FILE, NAMES_FILE, ReferenceCatalog, SpeciesEntry};
pub use economics::{
    EvolutionOutlook, FamilyOutlook, UPGRADE_REFUND, affordable_upgrades, base_form_counts,
    evolution_outlook,
};
pub use engine::{Engine, Plan, Session};
pub use error::{CoreError, CoreErrorCode};
pub use executor::{
    DEFAULT_EVOLVE_DELAY, DEFAULT_MAX_EVOLUTIONS, DEFAULT_TRANSFER_DELAY, ExecutionConfig,
    ExecutionError, ExecutionReport, FailureRecord, LoopEnd, MutationKind, MutationRecord, Phase,
    PlanExecutor, Step,
};
pub use selection::{
    DEFAULT_QUALITY_THRESHOLD, SelectionConfig, SpeciesFilter, order_by_quality_asc,
    order_by_quality_desc, select,
};
pub use service::{InventoryService, ServiceError};
pub use snapshot::{CREATURE_RECORD_KEY, FAMILY_RECORD_KEY, build_snapshot};
pub use types::{
    CreatureId, Individual, MAX_SUBSTAT, MAX_SUBSTAT_SUM, SelectionSet, Snapshot, quality,
};
