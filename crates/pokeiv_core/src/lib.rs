//! Keep/transfer selection and evolution planning for a creature inventory.
//!
//! An inventory payload is flattened into a [`core_api::Snapshot`], split into
//! keep and surplus sets, priced against each family's currency, and then
//! executed one confirmed mutation at a time by [`core_api::PlanExecutor`].

pub mod core_api;
