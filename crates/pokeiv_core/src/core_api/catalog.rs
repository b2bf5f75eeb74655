use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, CoreErrorCode};

pub const NAMES_FILE: &str = "names.tsv";
pub const FAMILIES_FILE: &str = "families.tsv";
pub const COSTS_FILE: &str = "evolves.tsv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesEntry {
    pub species_id: u32,
    pub name: String,
    pub family_id: u32,
    pub upgrade_cost: Option<u32>,
}

/// Static species reference data: display names, evolution families and the
/// currency price of one evolution step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCatalog {
    entries: BTreeMap<u32, SpeciesEntry>,
    by_name: BTreeMap<String, u32>,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = SpeciesEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    pub fn insert(&mut self, entry: SpeciesEntry) {
        if let Some(previous) = self.entries.get(&entry.species_id) {
            self.by_name.remove(&previous.name.to_lowercase());
        }
        self.by_name.insert(entry.name.to_lowercase(), entry.species_id);
        self.entries.insert(entry.species_id, entry);
    }

    /// Loads `names.tsv`, `families.tsv` and `evolves.tsv` from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CoreError> {
        let read = |file: &str| {
            let path = dir.join(file);
            fs::read_to_string(&path).map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Io,
                    format!("failed to read {}: {e}", path.display()),
                )
            })
        };

        let catalog = Self::from_tsv(
            &read(NAMES_FILE)?,
            &read(FAMILIES_FILE)?,
            &read(COSTS_FILE)?,
        )?;
        tracing::debug!(
            target: "pokeiv::catalog",
            dir = %dir.display(),
            species = catalog.len(),
            "catalog.loaded"
        );
        Ok(catalog)
    }

    /// Builds a catalog from the three tab separated tables. Each table has one
    /// header line followed by `species_id<TAB>value` rows.
    ///
    /// A species without a family row is its own family. A cost of zero, or no
    /// cost row at all, marks a species that cannot evolve further.
    pub fn from_tsv(names: &str, families: &str, costs: &str) -> Result<Self, CoreError> {
        let names = parse_tsv_pairs(names, NAMES_FILE)?;
        let families: BTreeMap<u32, u32> = parse_tsv_pairs(families, FAMILIES_FILE)?
            .into_iter()
            .map(|(line, species_id, value)| {
                Ok((species_id, parse_u32(&value, FAMILIES_FILE, line)?))
            })
            .collect::<Result<_, CoreError>>()?;
        let costs: BTreeMap<u32, u32> = parse_tsv_pairs(costs, COSTS_FILE)?
            .into_iter()
            .map(|(line, species_id, value)| {
                Ok((species_id, parse_u32(&value, COSTS_FILE, line)?))
            })
            .collect::<Result<_, CoreError>>()?;

        if names.is_empty() {
            return Err(CoreError::new(
                CoreErrorCode::Parse,
                format!("no entries found in {NAMES_FILE}"),
            ));
        }

        let mut catalog = Self::new();
        for (_, species_id, name) in names {
            catalog.insert(SpeciesEntry {
                species_id,
                name,
                family_id: families.get(&species_id).copied().unwrap_or(species_id),
                upgrade_cost: costs.get(&species_id).copied().filter(|&cost| cost > 0),
            });
        }
        Ok(catalog)
    }

    pub fn get(&self, species_id: u32) -> Option<&SpeciesEntry> {
        self.entries.get(&species_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SpeciesEntry> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .and_then(|id| self.entries.get(id))
    }

    /// Resolves a user supplied token, either a numeric species id or a display
    /// name in any letter case.
    pub fn resolve(&self, token: &str) -> Option<u32> {
        let token = token.trim();
        if let Ok(id) = token.parse::<u32>() {
            return self.entries.contains_key(&id).then_some(id);
        }
        self.find_by_name(token).map(|entry| entry.species_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeciesEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_tsv_pairs(contents: &str, file: &str) -> Result<Vec<(usize, u32, String)>, CoreError> {
    let mut out = Vec::new();
    for (index, line) in contents.lines().enumerate().skip(1) {
        let line_no = index + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let mut columns = line.split('\t');
        let key = columns.next().unwrap_or("");
        let Some(value) = columns.next() else {
            return Err(CoreError::new(
                CoreErrorCode::Parse,
                format!("{file}:{line_no}: expected two tab separated columns"),
            ));
        };
        let species_id = parse_u32(key, file, line_no)?;
        out.push((line_no, species_id, value.trim().to_string()));
    }
    Ok(out)
}

fn parse_u32(raw: &str, file: &str, line_no: usize) -> Result<u32, CoreError> {
    raw.trim().parse::<u32>().map_err(|e| {
        CoreError::new(
            CoreErrorCode::Parse,
            format!("{file}:{line_no}: invalid number {raw:?}: {e}"),
        )
    })
}
