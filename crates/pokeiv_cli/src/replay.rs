use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pokeiv_core::core_api::{CREATURE_RECORD_KEY, CreatureId, InventoryService, ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    Evolve,
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub action: JournalAction,
    pub id: CreatureId,
}

#[derive(Serialize)]
struct Journal<'a> {
    source: String,
    mutations: &'a [JournalEntry],
}

/// Offline stand-in for the remote inventory. Serves a saved payload and
/// acknowledges mutations locally, recording each one in a journal.
#[derive(Debug)]
pub struct ReplayService {
    source: PathBuf,
    payload: JsonValue,
    known: BTreeSet<CreatureId>,
    released: BTreeSet<CreatureId>,
    evolved: BTreeSet<CreatureId>,
    journal: Vec<JournalEntry>,
}

impl ReplayService {
    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ServiceError::Transport(format!("failed to read {}: {e}", path.display()))
        })?;
        let payload: JsonValue = serde_json::from_str(&text).map_err(|e| {
            ServiceError::Transport(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        Ok(Self::new(path.to_path_buf(), payload))
    }

    pub fn new(source: PathBuf, payload: JsonValue) -> Self {
        let mut known = BTreeSet::new();
        collect_ids(&payload, &mut known);
        tracing::debug!(
            target: "pokeiv::replay",
            source = %source.display(),
            creatures = known.len(),
            "replay.loaded"
        );
        Self {
            source,
            payload,
            known,
            released: BTreeSet::new(),
            evolved: BTreeSet::new(),
            journal: Vec::new(),
        }
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub fn journal_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Journal {
            source: self.source.display().to_string(),
            mutations: &self.journal,
        })
    }

    pub fn write_journal(&self, path: &Path) -> io::Result<()> {
        let mut json = self.journal_json().map_err(io::Error::other)?;
        json.push('\n');
        fs::write(path, json)
    }

    fn check_present(&self, id: CreatureId) -> Result<(), ServiceError> {
        if !self.known.contains(&id) {
            return Err(ServiceError::Rejected(format!("unknown creature {id}")));
        }
        if self.released.contains(&id) {
            return Err(ServiceError::Rejected(format!(
                "creature {id} was already transferred"
            )));
        }
        Ok(())
    }
}

impl InventoryService for ReplayService {
    fn fetch_inventory(&mut self) -> Result<JsonValue, ServiceError> {
        Ok(self.payload.clone())
    }

    fn evolve(&mut self, id: CreatureId) -> Result<(), ServiceError> {
        self.check_present(id)?;
        if !self.evolved.insert(id) {
            return Err(ServiceError::Rejected(format!(
                "creature {id} was already evolved"
            )));
        }
        self.journal.push(JournalEntry {
            action: JournalAction::Evolve,
            id,
        });
        Ok(())
    }

    fn release(&mut self, id: CreatureId) -> Result<(), ServiceError> {
        self.check_present(id)?;
        self.released.insert(id);
        self.journal.push(JournalEntry {
            action: JournalAction::Release,
            id,
        });
        Ok(())
    }
}

fn collect_ids(node: &JsonValue, ids: &mut BTreeSet<CreatureId>) {
    match node {
        JsonValue::Object(map) => {
            if let Some(raw) = map.get(CREATURE_RECORD_KEY).and_then(|record| record.get("id"))
                && let Ok(id) = CreatureId::deserialize(raw)
            {
                ids.insert(id);
            }
            for value in map.values() {
                collect_ids(value, ids);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_ids(item, ids);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn service() -> ReplayService {
        ReplayService::new(
            PathBuf::from("inventory.json"),
            json!({ "items": [
                { "pokemon_data": { "id": "7", "pokemon_id": 16 } },
                { "pokemon_data": { "id": 8, "pokemon_id": 16 } },
            ]}),
        )
    }

    #[test]
    fn acknowledges_known_creatures_once() {
        let mut service = service();
        service.evolve(CreatureId(7)).expect("known creature evolves");
        service.release(CreatureId(7)).expect("known creature releases");

        assert!(matches!(
            service.release(CreatureId(7)),
            Err(ServiceError::Rejected(_))
        ));
        assert!(matches!(
            service.evolve(CreatureId(7)),
            Err(ServiceError::Rejected(_))
        ));
        assert!(matches!(
            service.release(CreatureId(9)),
            Err(ServiceError::Rejected(_))
        ));
        assert_eq!(
            service.journal(),
            &[
                JournalEntry {
                    action: JournalAction::Evolve,
                    id: CreatureId(7),
                },
                JournalEntry {
                    action: JournalAction::Release,
                    id: CreatureId(7),
                },
            ]
        );
    }

    #[test]
    fn rejects_a_second_evolution_of_the_same_creature() {
        let mut service = service();
        service.evolve(CreatureId(8)).expect("known creature evolves");

        match service.evolve(CreatureId(8)) {
            Err(ServiceError::Rejected(message)) => {
                assert!(message.contains("already evolved"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        service
            .release(CreatureId(8))
            .expect("evolved creature can still be released");
        assert_eq!(service.journal().len(), 2);
    }

    #[test]
    fn journal_serializes_ids_as_strings() {
        let mut service = service();
        service.release(CreatureId(8)).expect("known creature releases");

        let value: JsonValue =
            serde_json::from_str(&service.journal_json().expect("journal serializes"))
                .expect("journal is json");
        assert_eq!(value["source"], "inventory.json");
        assert_eq!(value["mutations"][0]["action"], "release");
        assert_eq!(value["mutations"][0]["id"], "8");
    }

    #[test]
    fn fetch_returns_the_saved_payload() {
        let mut service = service();
        let payload = service.fetch_inventory().expect("payload is served");
        assert_eq!(payload["items"][1]["pokemon_data"]["id"], 8);
    }
}
