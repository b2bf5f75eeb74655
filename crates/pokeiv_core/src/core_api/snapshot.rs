use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::catalog::ReferenceCatalog;
use super::error::{CoreError, CoreErrorCode};
use super::types::{CreatureId, Individual, MAX_SUBSTAT, Snapshot};

pub const CREATURE_RECORD_KEY: &str = "pokemon_data";
pub const FAMILY_RECORD_KEY: &str = "pokemon_family";

#[derive(Debug, Deserialize)]
struct CreatureRecord {
    #[serde(default)]
    id: Option<CreatureId>,
    #[serde(default)]
    pokemon_id: Option<u32>,
    #[serde(default)]
    is_egg: bool,
    #[serde(default)]
    individual_stamina: u8,
    #[serde(default)]
    individual_attack: u8,
    #[serde(default)]
    individual_defense: u8,
    #[serde(default)]
    cp: u32,
}

#[derive(Debug, Deserialize)]
struct FamilyRecord {
    family_id: u32,
    #[serde(default)]
    candy: u32,
}

/// Flattens an inventory payload into a [`Snapshot`].
///
/// Creature and family currency records are picked up wherever they sit in the
/// payload. Eggs (records without a species) are skipped. Any creature whose
/// species is unknown to `catalog` fails the whole build.
pub fn build_snapshot(
    payload: &JsonValue,
    catalog: &ReferenceCatalog,
) -> Result<Snapshot, CoreError> {
    let mut collector = RecordCollector {
        catalog,
        individuals: Vec::new(),
        seen_ids: BTreeSet::new(),
        balances: BTreeMap::new(),
        skipped_eggs: 0,
    };
    collector.visit(payload)?;

    tracing::debug!(
        target: "pokeiv::snapshot",
        individuals = collector.individuals.len(),
        families = collector.balances.len(),
        skipped_eggs = collector.skipped_eggs,
        "snapshot.built"
    );

    Ok(Snapshot {
        individuals: collector.individuals,
        balances: collector.balances,
    })
}

struct RecordCollector<'a> {
    catalog: &'a ReferenceCatalog,
    individuals: Vec<Individual>,
    seen_ids: BTreeSet<CreatureId>,
    balances: BTreeMap<u32, u32>,
    skipped_eggs: usize,
}

impl RecordCollector<'_> {
    fn visit(&mut self, node: &JsonValue) -> Result<(), CoreError> {
        match node {
            JsonValue::Object(map) => {
                if let Some(record) = map.get(CREATURE_RECORD_KEY) {
                    self.add_creature(record)?;
                }
                if let Some(record) = map.get(FAMILY_RECORD_KEY) {
                    self.add_family(record)?;
                }
                for value in map.values() {
                    self.visit(value)?;
                }
            }
            JsonValue::Array(items) => {
                for item in items {
                    self.visit(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn add_creature(&mut self, raw: &JsonValue) -> Result<(), CoreError> {
        let record = CreatureRecord::deserialize(raw).map_err(|e| {
            CoreError::new(
                CoreErrorCode::MalformedPayload,
                format!("invalid {CREATURE_RECORD_KEY} record: {e}"),
            )
        })?;

        let Some(species_id) = record.pokemon_id.filter(|_| !record.is_egg) else {
            self.skipped_eggs += 1;
            return Ok(());
        };
        let Some(id) = record.id else {
            return Err(CoreError::new(
                CoreErrorCode::MalformedPayload,
                format!("{CREATURE_RECORD_KEY} record for species {species_id} has no id"),
            ));
        };
        let Some(entry) = self.catalog.get(species_id) else {
            return Err(CoreError::new(
                CoreErrorCode::MalformedPayload,
                format!("creature {id} references species {species_id} missing from the catalog"),
            ));
        };
        for (label, value) in [
            ("individual_stamina", record.individual_stamina),
            ("individual_attack", record.individual_attack),
            ("individual_defense", record.individual_defense),
        ] {
            if value > MAX_SUBSTAT {
                return Err(CoreError::new(
                    CoreErrorCode::MalformedPayload,
                    format!("creature {id} has {label}={value}, expected 0-{MAX_SUBSTAT}"),
                ));
            }
        }
        if !self.seen_ids.insert(id) {
            return Err(CoreError::new(
                CoreErrorCode::MalformedPayload,
                format!("creature {id} appears more than once"),
            ));
        }

        self.individuals.push(Individual {
            id,
            species_id,
            name: entry.name.clone(),
            family_id: entry.family_id,
            stamina: record.individual_stamina,
            attack: record.individual_attack,
            defense: record.individual_defense,
            power: record.cp,
            upgrade_cost: entry.upgrade_cost,
            ordinal: self.individuals.len(),
        });
        Ok(())
    }

    fn add_family(&mut self, raw: &JsonValue) -> Result<(), CoreError> {
        let record = FamilyRecord::deserialize(raw).map_err(|e| {
            CoreError::new(
                CoreErrorCode::MalformedPayload,
                format!("invalid {FAMILY_RECORD_KEY} record: {e}"),
            )
        })?;
        self.balances.insert(record.family_id, record.candy);
        Ok(())
    }
}
