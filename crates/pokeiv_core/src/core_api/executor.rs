use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::economics::{EvolutionOutlook, UPGRADE_REFUND, base_form_counts};
use super::error::{CoreError, CoreErrorCode};
use super::selection::{SpeciesFilter, order_by_quality_asc, order_by_quality_desc};
use super::service::{InventoryService, ServiceError};
use super::types::{CreatureId, Individual, SelectionSet, Snapshot};

pub const DEFAULT_MAX_EVOLUTIONS: u32 = 71;
pub const DEFAULT_EVOLVE_DELAY: Duration = Duration::from_secs(25);
pub const DEFAULT_TRANSFER_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub evolve: bool,
    pub transfer: bool,
    pub max_evolutions: u32,
    pub evolve_delay: Duration,
    pub transfer_delay: Duration,
    /// Transfer surplus even when it is still needed as evolution fuel.
    pub force: bool,
    pub filter: SpeciesFilter,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            evolve: false,
            transfer: false,
            max_evolutions: DEFAULT_MAX_EVOLUTIONS,
            evolve_delay: DEFAULT_EVOLVE_DELAY,
            transfer_delay: DEFAULT_TRANSFER_DELAY,
            force: false,
            filter: SpeciesFilter::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Evolving,
    Transferring,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Evolve,
    Release,
}

/// How a loop of the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopEnd {
    #[default]
    Disabled,
    /// No eligible candidate was left.
    Exhausted,
    /// The configured step cap was hit with work remaining.
    CapReached,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub id: CreatureId,
    pub species_id: u32,
    pub name: String,
    pub power: u32,
    pub quality: f64,
}

impl MutationRecord {
    fn new(kind: MutationKind, individual: &Individual) -> Self {
        Self {
            kind,
            id: individual.id,
            species_id: individual.species_id,
            name: individual.name.clone(),
            power: individual.power,
            quality: individual.quality(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub phase: Phase,
    pub id: CreatureId,
    pub species_id: u32,
    pub name: String,
    pub message: String,
}

/// Tally of confirmed mutations. Only remotely acknowledged work is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub evolved: Vec<MutationRecord>,
    pub transferred: Vec<MutationRecord>,
    pub evolve_end: LoopEnd,
    pub transfer_end: LoopEnd,
    pub failures: Vec<FailureRecord>,
}

impl ExecutionReport {
    fn new() -> Self {
        Self {
            evolved: Vec::new(),
            transferred: Vec::new(),
            evolve_end: LoopEnd::Disabled,
            transfer_end: LoopEnd::Disabled,
            failures: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// One mutation was confirmed. The caller should wait `pause` before the
    /// next step.
    Mutated {
        record: MutationRecord,
        pause: Duration,
    },
    Finished(ExecutionReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase:?} aborted at {name} #{species_id} ({id}): {source}")]
pub struct ExecutionError {
    pub phase: Phase,
    pub id: CreatureId,
    pub species_id: u32,
    pub name: String,
    #[source]
    pub source: ServiceError,
}

impl From<ExecutionError> for CoreError {
    fn from(err: ExecutionError) -> Self {
        CoreError::new(CoreErrorCode::RemoteMutationFailed, err.to_string())
    }
}

/// Local mirror of one family's currency and base form stock.
#[derive(Debug, Clone, PartialEq)]
struct FamilyLedger {
    unit_cost: Option<u32>,
    balance: u32,
    affordable: f64,
    base_forms: u32,
}

impl FamilyLedger {
    fn realizable(&self) -> u32 {
        if self.affordable <= 0.0 {
            return 0;
        }
        (self.affordable.floor() as u32).min(self.base_forms)
    }
}

/// Runs an evolve pass and then a transfer pass against an
/// [`InventoryService`], one confirmed mutation per [`PlanExecutor::step`].
///
/// The executor never sleeps. Each mutating step returns the pause the caller
/// should honour, and stopping between steps is always safe.
#[derive(Debug)]
pub struct PlanExecutor {
    phase: Phase,
    config: ExecutionConfig,
    remaining: Vec<Individual>,
    transfer_queue: VecDeque<Individual>,
    ledgers: BTreeMap<u32, FamilyLedger>,
    report: ExecutionReport,
}

impl PlanExecutor {
    pub fn new(
        snapshot: &Snapshot,
        selection: &SelectionSet,
        outlook: &EvolutionOutlook,
        config: ExecutionConfig,
    ) -> Self {
        let mut remaining = snapshot.individuals.clone();
        order_by_quality_desc(&mut remaining);

        let mut surplus = selection.surplus.clone();
        order_by_quality_asc(&mut surplus);

        let counts = base_form_counts(&snapshot.individuals);
        let mut ledgers = BTreeMap::new();
        for individual in &snapshot.individuals {
            ledgers
                .entry(individual.family_id)
                .or_insert_with(|| FamilyLedger {
                    unit_cost: None,
                    balance: snapshot.balance(individual.family_id),
                    affordable: 0.0,
                    base_forms: counts.get(&individual.family_id).copied().unwrap_or(0),
                });
            if individual.is_base_form()
                && let Some(ledger) = ledgers.get_mut(&individual.family_id)
            {
                ledger.unit_cost = individual.upgrade_cost;
            }
        }
        for family in outlook.iter() {
            if let Some(ledger) = ledgers.get_mut(&family.family_id) {
                ledger.affordable = family.affordable;
            }
        }

        Self {
            phase: Phase::Idle,
            config,
            remaining,
            transfer_queue: surplus.into(),
            ledgers,
            report: ExecutionReport::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn report(&self) -> &ExecutionReport {
        &self.report
    }

    /// Individuals not yet evolved or transferred, best first.
    pub fn remaining(&self) -> &[Individual] {
        &self.remaining
    }

    pub fn balance(&self, family_id: u32) -> u32 {
        self.ledgers.get(&family_id).map_or(0, |l| l.balance)
    }

    pub fn base_forms(&self, family_id: u32) -> u32 {
        self.ledgers.get(&family_id).map_or(0, |l| l.base_forms)
    }

    /// Evolutions still payable for `family_id`, fractional progress included.
    pub fn affordable(&self, family_id: u32) -> f64 {
        self.ledgers.get(&family_id).map_or(0.0, |l| l.affordable)
    }

    pub fn realizable(&self, family_id: u32) -> u32 {
        self.ledgers.get(&family_id).map_or(0, FamilyLedger::realizable)
    }

    /// Advances the run by at most one remote mutation.
    ///
    /// A failed mutation ends the loop it happened in and is returned as an
    /// error. Mutations confirmed before it stand, and calling `step` again
    /// moves on to the next loop.
    pub fn step<S>(&mut self, service: &mut S) -> Result<Step, ExecutionError>
    where
        S: InventoryService + ?Sized,
    {
        loop {
            match self.phase {
                Phase::Idle => {
                    self.phase = Phase::Evolving;
                    if !self.config.evolve {
                        self.report.evolve_end = LoopEnd::Disabled;
                        self.phase = Phase::Transferring;
                    }
                }
                Phase::Evolving => {
                    let Some(index) = self.next_evolve_candidate() else {
                        self.end_evolving(LoopEnd::Exhausted);
                        continue;
                    };
                    if self.report.evolved.len() >= self.config.max_evolutions as usize {
                        self.end_evolving(LoopEnd::CapReached);
                        continue;
                    }
                    return self.evolve_at(index, service);
                }
                Phase::Transferring => {
                    if !self.config.transfer {
                        self.report.transfer_end = LoopEnd::Disabled;
                        self.phase = Phase::Done;
                        continue;
                    }
                    let Some(candidate) = self.next_transfer_candidate() else {
                        self.report.transfer_end = LoopEnd::Exhausted;
                        self.phase = Phase::Done;
                        continue;
                    };
                    return self.release(candidate, service);
                }
                Phase::Done => return Ok(Step::Finished(self.report.clone())),
            }
        }
    }

    /// Steps until the run finishes or a mutation fails, ignoring pauses.
    pub fn run_to_end<S>(&mut self, service: &mut S) -> Result<ExecutionReport, ExecutionError>
    where
        S: InventoryService + ?Sized,
    {
        loop {
            if let Step::Finished(report) = self.step(service)? {
                return Ok(report);
            }
        }
    }

    fn end_evolving(&mut self, end: LoopEnd) {
        tracing::info!(
            target: "pokeiv::execute",
            evolved = self.report.evolved.len(),
            end = ?end,
            "evolve.finished"
        );
        self.report.evolve_end = end;
        self.phase = Phase::Transferring;
    }

    fn next_evolve_candidate(&self) -> Option<usize> {
        self.remaining.iter().position(|individual| {
            individual.is_base_form()
                && individual.upgrade_cost.is_some()
                && self.config.filter.admits(individual)
                && self.realizable(individual.family_id) > 0
        })
    }

    fn evolve_at<S>(&mut self, index: usize, service: &mut S) -> Result<Step, ExecutionError>
    where
        S: InventoryService + ?Sized,
    {
        let candidate = &self.remaining[index];
        if let Err(source) = service.evolve(candidate.id) {
            let candidate = candidate.clone();
            self.report.evolve_end = LoopEnd::Failed;
            self.phase = Phase::Transferring;
            return Err(self.fail(Phase::Evolving, &candidate, source));
        }

        let candidate = self.remaining.remove(index);
        if let Some(ledger) = self.ledgers.get_mut(&candidate.family_id) {
            let cost = ledger.unit_cost.unwrap_or(0);
            ledger.affordable -= 1.0;
            ledger.base_forms = ledger.base_forms.saturating_sub(1);
            if ledger.balance < cost {
                tracing::warn!(
                    target: "pokeiv::execute",
                    family = candidate.family_id,
                    balance = ledger.balance,
                    cost,
                    "ledger.balance_below_cost"
                );
            }
            ledger.balance = ledger
                .balance
                .saturating_sub(cost)
                .saturating_add(UPGRADE_REFUND);
        }
        let record = MutationRecord::new(MutationKind::Evolve, &candidate);
        tracing::info!(
            target: "pokeiv::execute",
            id = %candidate.id,
            name = %candidate.name,
            power = candidate.power,
            quality = candidate.quality(),
            "evolve.confirmed"
        );
        self.report.evolved.push(record.clone());
        Ok(Step::Mutated {
            record,
            pause: self.config.evolve_delay,
        })
    }

    fn next_transfer_candidate(&mut self) -> Option<Individual> {
        while let Some(candidate) = self.transfer_queue.pop_front() {
            if !self.remaining.iter().any(|i| i.id == candidate.id) {
                continue;
            }
            if !self.config.filter.admits(&candidate) {
                continue;
            }
            if self.is_evolution_fuel(&candidate) {
                tracing::debug!(
                    target: "pokeiv::execute",
                    id = %candidate.id,
                    name = %candidate.name,
                    "transfer.skipped_fuel"
                );
                continue;
            }
            return Some(candidate);
        }
        None
    }

    // A base form is fuel while its family can pay for at least as many
    // evolutions as there are base forms left.
    fn is_evolution_fuel(&self, individual: &Individual) -> bool {
        if self.config.force || !individual.is_base_form() {
            return false;
        }
        self.ledgers
            .get(&individual.family_id)
            .is_some_and(|l| l.affordable > 0.0 && f64::from(l.base_forms) <= l.affordable)
    }

    fn release<S>(&mut self, candidate: Individual, service: &mut S) -> Result<Step, ExecutionError>
    where
        S: InventoryService + ?Sized,
    {
        if let Err(source) = service.release(candidate.id) {
            self.report.transfer_end = LoopEnd::Failed;
            self.phase = Phase::Done;
            return Err(self.fail(Phase::Transferring, &candidate, source));
        }

        self.remaining.retain(|i| i.id != candidate.id);
        if candidate.is_base_form()
            && let Some(ledger) = self.ledgers.get_mut(&candidate.family_id)
        {
            ledger.base_forms = ledger.base_forms.saturating_sub(1);
        }
        let record = MutationRecord::new(MutationKind::Release, &candidate);
        tracing::info!(
            target: "pokeiv::execute",
            id = %candidate.id,
            name = %candidate.name,
            power = candidate.power,
            quality = candidate.quality(),
            "transfer.confirmed"
        );
        self.report.transferred.push(record.clone());
        Ok(Step::Mutated {
            record,
            pause: self.config.transfer_delay,
        })
    }

    fn fail(&mut self, phase: Phase, candidate: &Individual, source: ServiceError) -> ExecutionError {
        tracing::warn!(
            target: "pokeiv::execute",
            phase = ?phase,
            id = %candidate.id,
            name = %candidate.name,
            error = %source,
            "mutation.failed"
        );
        self.report.failures.push(FailureRecord {
            phase,
            id: candidate.id,
            species_id: candidate.species_id,
            name: candidate.name.clone(),
            message: source.to_string(),
        });
        ExecutionError {
            phase,
            id: candidate.id,
            species_id: candidate.species_id,
            name: candidate.name.clone(),
            source,
        }
    }
}
