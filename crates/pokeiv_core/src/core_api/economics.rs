use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{Individual, Snapshot};

/// Currency returned per evolution: one for the evolution itself and one for
/// the transfer that is expected to go with it.
pub const UPGRADE_REFUND: u32 = 2;

/// Number of evolutions `balance` can pay for at `unit_cost` each, counting the
/// currency the evolutions give back.
///
/// The count is deliberately left fractional. Its integer part is the number of
/// evolutions that can actually run and the remainder is progress toward the
/// next one; callers floor it only when they spend it.
///
/// For costs of three or less the refund never drops below the cost, so only
/// the first round of refunds is counted.
pub fn affordable_upgrades(balance: u32, unit_cost: u32) -> f64 {
    if balance == 0 || unit_cost == 0 {
        return 0.0;
    }

    let cost = f64::from(unit_cost);
    let refund = f64::from(UPGRADE_REFUND);
    let mut extra = f64::from(balance) / cost * refund;
    let mut total = f64::from(balance) + extra;

    if refunds_drain(unit_cost) {
        while extra / cost >= 1.0 {
            total += refund;
            extra = extra / cost + refund;
        }
    }

    total / cost
}

// extra -> extra / cost + 2 settles at 2c / (c - 1), which is below c only for c > 3.
fn refunds_drain(unit_cost: u32) -> bool {
    unit_cost > 3
}

/// Evolution economics for one family, keyed by its base species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyOutlook {
    pub family_id: u32,
    pub name: String,
    pub unit_cost: u32,
    pub balance: u32,
    pub affordable: f64,
    /// Owned individuals of the base species, duplicates included.
    pub base_forms: u32,
}

impl FamilyOutlook {
    /// Affordable evolutions not yet backed by an owned base form. Positive
    /// means more base forms are needed; zero or below means some can go.
    pub fn deficit(&self) -> f64 {
        self.affordable - f64::from(self.base_forms)
    }

    /// Evolutions that can run right now.
    pub fn realizable(&self) -> u32 {
        (self.affordable.floor() as u32).min(self.base_forms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionOutlook {
    pub families: BTreeMap<u32, FamilyOutlook>,
}

impl EvolutionOutlook {
    pub fn get(&self, family_id: u32) -> Option<&FamilyOutlook> {
        self.families.get(&family_id)
    }

    /// Sum of affordable evolutions across all families.
    pub fn total(&self) -> f64 {
        self.families.values().map(|family| family.affordable).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FamilyOutlook> {
        self.families.values()
    }
}

/// Owned base form individuals per family.
pub fn base_form_counts(individuals: &[Individual]) -> BTreeMap<u32, u32> {
    let mut counts = BTreeMap::new();
    for individual in individuals.iter().filter(|i| i.is_base_form()) {
        *counts.entry(individual.family_id).or_insert(0) += 1;
    }
    counts
}

/// Computes affordable evolutions for every family that has an owned base
/// form able to evolve and enough currency for at least partial progress.
pub fn evolution_outlook(snapshot: &Snapshot) -> EvolutionOutlook {
    let counts = base_form_counts(&snapshot.individuals);
    let mut outlook = EvolutionOutlook::default();

    for individual in &snapshot.individuals {
        if !individual.is_base_form() || outlook.families.contains_key(&individual.family_id) {
            continue;
        }
        let Some(unit_cost) = individual.upgrade_cost.filter(|&cost| cost > 0) else {
            continue;
        };

        let balance = snapshot.balance(individual.family_id);
        let affordable = affordable_upgrades(balance, unit_cost);
        if affordable <= 0.0 {
            continue;
        }

        let family = FamilyOutlook {
            family_id: individual.family_id,
            name: individual.name.clone(),
            unit_cost,
            balance,
            affordable,
            base_forms: counts.get(&individual.family_id).copied().unwrap_or(0),
        };
        tracing::debug!(
            target: "pokeiv::economics",
            family = family.family_id,
            name = %family.name,
            balance,
            unit_cost,
            affordable,
            deficit = family.deficit(),
            "economics.family"
        );
        outlook.families.insert(family.family_id, family);
    }

    outlook
}
