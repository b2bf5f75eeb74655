use std::path::PathBuf;

use pokeiv_core::core_api::{
    CoreErrorCode, CreatureId, Engine, ExecutionConfig, InventoryService, LoopEnd,
    ReferenceCatalog, SelectionConfig, ServiceError, Session, SpeciesEntry, affordable_upgrades,
};
use serde_json::{Value, json};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

#[derive(Default)]
struct AcceptAll {
    released: Vec<CreatureId>,
    evolved: Vec<CreatureId>,
}

impl InventoryService for AcceptAll {
    fn fetch_inventory(&mut self) -> Result<Value, ServiceError> {
        Err(ServiceError::Transport("offline".to_string()))
    }

    fn evolve(&mut self, id: CreatureId) -> Result<(), ServiceError> {
        self.evolved.push(id);
        Ok(())
    }

    fn release(&mut self, id: CreatureId) -> Result<(), ServiceError> {
        self.released.push(id);
        Ok(())
    }
}

fn species_a(unit_cost: u32) -> Engine {
    Engine::new(ReferenceCatalog::from_entries([SpeciesEntry {
        species_id: 1,
        name: "Alpha".to_string(),
        family_id: 1,
        upgrade_cost: Some(unit_cost),
    }]))
}

/// Three of species A at roughly 0.9, 0.5 and 0.5 quality.
fn three_of_a(candy: u32) -> Value {
    json!({ "items": [
        { "pokemon_data": { "id": 10, "pokemon_id": 1, "cp": 300,
            "individual_stamina": 14, "individual_attack": 14, "individual_defense": 13 } },
        { "pokemon_data": { "id": 11, "pokemon_id": 1, "cp": 120,
            "individual_stamina": 8, "individual_attack": 8, "individual_defense": 7 } },
        { "pokemon_data": { "id": 12, "pokemon_id": 1, "cp": 110,
            "individual_stamina": 7, "individual_attack": 8, "individual_defense": 7 } },
        { "pokemon_family": { "family_id": 1, "candy": candy } }
    ]})
}

fn threshold_point_eight() -> SelectionConfig {
    SelectionConfig {
        quality_threshold: 0.8,
        ..SelectionConfig::default()
    }
}

fn transfer_only() -> ExecutionConfig {
    ExecutionConfig {
        transfer: true,
        ..ExecutionConfig::default()
    }
}

#[test]
fn scenario_keeps_the_best_and_spares_fuel_when_candy_is_plentiful() {
    let session = species_a(1)
        .open_payload(&three_of_a(5))
        .expect("payload should build");
    let plan = session.plan(&threshold_point_eight());

    let keep: Vec<u64> = plan.selection.keep.iter().map(|i| i.id.0).collect();
    let surplus: Vec<u64> = plan.selection.surplus.iter().map(|i| i.id.0).collect();
    assert_eq!(keep, vec![10]);
    assert_eq!(surplus, vec![11, 12]);
    assert!(plan.selection.is_surplus(CreatureId(11)));
    assert!(!plan.selection.is_surplus(CreatureId(10)));

    let family = plan.outlook.get(1).expect("family A is priced");
    assert_eq!(family.affordable, affordable_upgrades(5, 1));
    assert_eq!(family.affordable, 15.0);
    assert_eq!(family.base_forms, 3);
    assert_eq!(family.deficit(), 12.0);

    let mut service = AcceptAll::default();
    let report = session
        .executor(&plan, transfer_only())
        .run_to_end(&mut service)
        .expect("no failures");
    assert!(service.released.is_empty());
    assert_eq!(report.transfer_end, LoopEnd::Exhausted);
}

#[test]
fn scenario_transfers_one_when_candy_covers_two() {
    // 24 candy at cost 12 affords 2.33 evolutions: one of three base forms is spare
    let session = species_a(12)
        .open_payload(&three_of_a(24))
        .expect("payload should build");
    let plan = session.plan(&threshold_point_eight());
    assert!(plan.outlook.get(1).expect("priced").deficit() < 0.0);

    let mut service = AcceptAll::default();
    session
        .executor(&plan, transfer_only())
        .run_to_end(&mut service)
        .expect("no failures");
    assert_eq!(service.released, vec![CreatureId(12)]);
}

#[test]
fn scenario_transfers_both_when_candy_is_scarce() {
    let session = species_a(12)
        .open_payload(&three_of_a(5))
        .expect("payload should build");
    let plan = session.plan(&threshold_point_eight());

    let mut service = AcceptAll::default();
    session
        .executor(&plan, transfer_only())
        .run_to_end(&mut service)
        .expect("no failures");
    assert_eq!(service.released, vec![CreatureId(12), CreatureId(11)]);
}

#[test]
fn scenario_evolves_then_transfers_the_rest() {
    let session = species_a(12)
        .open_payload(&three_of_a(24))
        .expect("payload should build");
    let plan = session.plan(&threshold_point_eight());
    let config = ExecutionConfig {
        evolve: true,
        transfer: true,
        ..ExecutionConfig::default()
    };

    let mut service = AcceptAll::default();
    let report = session
        .executor(&plan, config)
        .run_to_end(&mut service)
        .expect("no failures");
    assert_eq!(service.evolved, vec![CreatureId(10), CreatureId(11)]);
    assert_eq!(service.released, vec![CreatureId(12)]);
    assert_eq!(report.evolve_end, LoopEnd::Exhausted);
}

#[test]
fn open_service_surfaces_read_failures() {
    let err = species_a(12)
        .open_service(&mut AcceptAll::default())
        .expect_err("fetch fails");
    assert_eq!(err.code, CoreErrorCode::Io);
}

#[test]
fn bundled_catalog_covers_the_fixture_inventory() {
    let catalog = ReferenceCatalog::load_from_dir(&workspace_root().join("data"))
        .expect("bundled tables should load");
    assert_eq!(catalog.len(), 151);
    assert_eq!(catalog.resolve("pidgey"), Some(16));
    let pidgeotto = catalog.get(17).expect("species 17");
    assert_eq!(pidgeotto.family_id, 16);
    assert_eq!(pidgeotto.upgrade_cost, Some(50));
    assert_eq!(catalog.get(18).and_then(|e| e.upgrade_cost), None);
    assert!(
        catalog
            .iter()
            .filter(|entry| entry.upgrade_cost.is_some())
            .all(|entry| catalog.get(entry.family_id).is_some())
    );
    assert_eq!(
        catalog
            .iter()
            .filter(|entry| entry.family_id == entry.species_id)
            .count(),
        79
    );
    assert_eq!(
        catalog
            .iter()
            .filter(|entry| entry.upgrade_cost.is_some())
            .count(),
        70
    );

    let payload: Value = serde_json::from_str(
        &std::fs::read_to_string(workspace_root().join("tests/fixtures/inventory.json"))
            .expect("fixture should be readable"),
    )
    .expect("fixture should be json");
    let session = Engine::new(catalog)
        .open_payload(&payload)
        .expect("fixture should build");
    assert!(!session.snapshot().is_empty());
}

#[test]
fn session_rebuilt_from_a_snapshot_plans_the_same() {
    let session = species_a(12)
        .open_payload(&three_of_a(24))
        .expect("payload should build");
    let rebuilt = Session::from_snapshot(session.snapshot().clone());

    assert_eq!(rebuilt, session);
    assert_eq!(
        rebuilt.plan(&threshold_point_eight()),
        session.plan(&threshold_point_eight())
    );
}
