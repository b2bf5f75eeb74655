use std::collections::BTreeSet;

use super::error::{CoreError, CoreErrorCode};
use super::types::{Individual, SelectionSet};

/// Quality threshold used when none is configured. Nothing reaches 101%, so
/// only the best specimen of each species is kept.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 1.01;

/// Restricts which species the planner may touch. Tokens are species ids or
/// display names, compared without regard to letter case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SpeciesFilter {
    #[default]
    All,
    Allow(BTreeSet<String>),
    Deny(BTreeSet<String>),
}

impl SpeciesFilter {
    pub fn new(allow: Option<Vec<String>>, deny: Option<Vec<String>>) -> Result<Self, CoreError> {
        let normalize = |tokens: Vec<String>| -> BTreeSet<String> {
            tokens
                .into_iter()
                .map(|token| token.trim().to_lowercase())
                .filter(|token| !token.is_empty())
                .collect()
        };

        match (allow, deny) {
            (Some(_), Some(_)) => Err(CoreError::new(
                CoreErrorCode::ConflictingFilter,
                "allow list and deny list can not be used together",
            )),
            (Some(allow), None) => Ok(Self::Allow(normalize(allow))),
            (None, Some(deny)) => Ok(Self::Deny(normalize(deny))),
            (None, None) => Ok(Self::All),
        }
    }

    pub fn admits_species(&self, species_id: u32, name: &str) -> bool {
        let listed = |tokens: &BTreeSet<String>| {
            tokens.contains(&species_id.to_string()) || tokens.contains(&name.to_lowercase())
        };
        match self {
            Self::All => true,
            Self::Allow(tokens) => listed(tokens),
            Self::Deny(tokens) => !listed(tokens),
        }
    }

    pub fn admits(&self, individual: &Individual) -> bool {
        self.admits_species(individual.species_id, &individual.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Quality fraction at or above which duplicates are kept.
    pub quality_threshold: f64,
    /// Keep exactly the individuals meeting the threshold, with no
    /// per-species guarantee.
    pub hard_minimum: bool,
    /// Duplicates at or above this power rating are kept regardless of quality.
    pub power_override: Option<u32>,
    /// Drop the per-species guarantee for individuals failing the threshold.
    pub force: bool,
    pub filter: SpeciesFilter,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            hard_minimum: false,
            power_override: None,
            force: false,
            filter: SpeciesFilter::All,
        }
    }
}

/// Orders individuals best first. Equal quality keeps snapshot order.
pub fn order_by_quality_desc(individuals: &mut [Individual]) {
    individuals.sort_by(|a, b| {
        b.substat_sum()
            .cmp(&a.substat_sum())
            .then(a.ordinal.cmp(&b.ordinal))
    });
}

/// Orders individuals weakest first. Equal quality keeps snapshot order.
pub fn order_by_quality_asc(individuals: &mut [Individual]) {
    individuals.sort_by(|a, b| {
        a.substat_sum()
            .cmp(&b.substat_sum())
            .then(a.ordinal.cmp(&b.ordinal))
    });
}

/// Splits `individuals` into the ones worth keeping and the surplus.
///
/// Species rejected by the filter are never surplus. Both halves come back
/// ordered best first.
pub fn select(individuals: &[Individual], config: &SelectionConfig) -> SelectionSet {
    let mut ordered = individuals.to_vec();
    order_by_quality_desc(&mut ordered);

    let mut selection = SelectionSet::default();
    let mut kept_species = BTreeSet::new();

    for individual in ordered {
        if !config.filter.admits(&individual) {
            selection.keep.push(individual);
            continue;
        }

        let meets_threshold = individual.quality() >= config.quality_threshold;
        let keep = if config.hard_minimum {
            meets_threshold
        } else {
            let overridden = config
                .power_override
                .is_some_and(|limit| individual.power >= limit);
            let first_of_species = !kept_species.contains(&individual.species_id);
            meets_threshold || overridden || (first_of_species && !config.force)
        };

        if keep {
            kept_species.insert(individual.species_id);
            selection.keep.push(individual);
        } else {
            selection.surplus.push(individual);
        }
    }

    tracing::debug!(
        target: "pokeiv::select",
        keep = selection.keep.len(),
        surplus = selection.surplus.len(),
        threshold = config.quality_threshold,
        hard_minimum = config.hard_minimum,
        "selection.partitioned"
    );
    selection
}
