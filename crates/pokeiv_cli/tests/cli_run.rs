use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn inventory_path() -> String {
    workspace_root()
        .join("tests/fixtures/inventory.json")
        .to_string_lossy()
        .to_string()
}

fn catalog_dir() -> String {
    workspace_root().join("data").to_string_lossy().to_string()
}

fn run_cli(args: &[&str]) -> std::process::Output {
    let catalog = catalog_dir();
    Command::new(env!("CARGO_BIN_EXE_pokeiv"))
        .args(["--catalog-dir", &catalog])
        .args(["--evolution-delay", "0", "--transfer-delay", "0"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pokeiv CLI")
}

fn temp_path(prefix: &str, extension: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "{prefix}_{}_{}.{extension}",
        std::process::id(),
        nanos
    ))
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be json")
}

fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array of records")
        .iter()
        .map(|record| record["id"].as_str().expect("id string").to_string())
        .collect()
}

#[test]
fn cli_prints_plan_tables_without_mutating() {
    let inventory = inventory_path();
    let output = run_cli(&[&inventory]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Highest IV Pokemon"));
    assert!(stdout.contains("May be transfered"));
    assert!(stdout.contains("Available evolutions"));
    assert!(!stdout.contains("transferring pokemon"));
    assert!(!stdout.contains("Run summary"));
}

#[test]
fn cli_json_plan_partitions_the_fixture() {
    let inventory = inventory_path();
    let output = run_cli(&["--json", &inventory]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(
        ids(&value["keep"]),
        vec!["1009", "1001", "1005", "1012", "1006", "1011"]
    );
    assert_eq!(
        ids(&value["surplus"]),
        vec!["1002", "1007", "1010", "1003", "1008", "1004"]
    );
}

#[test]
fn cli_transfers_only_what_evolutions_do_not_need() {
    let inventory = inventory_path();
    let output = run_cli(&["--transfer", "--json", &inventory]);
    assert!(output.status.success());

    let report = &stdout_json(&output)["report"];
    assert_eq!(report["evolve_end"], "disabled");
    assert_eq!(report["transfer_end"], "exhausted");
    assert!(ids(&report["evolved"]).is_empty());
    assert_eq!(
        ids(&report["transferred"]),
        vec!["1004", "1008", "1010", "1007"]
    );
}

#[test]
fn cli_evolves_best_first_then_transfers() {
    let inventory = inventory_path();
    let output = run_cli(&["--evolve", "--transfer", "--json", &inventory]);
    assert!(output.status.success());

    let report = &stdout_json(&output)["report"];
    assert_eq!(
        ids(&report["evolved"]),
        vec!["1001", "1002", "1006", "1003"]
    );
    assert_eq!(report["evolve_end"], "exhausted");
    assert_eq!(
        ids(&report["transferred"]),
        vec!["1004", "1008", "1010", "1007"]
    );
    assert!(report["failures"].as_array().expect("failures").is_empty());
}

#[test]
fn cli_stops_evolving_at_the_cap() {
    let inventory = inventory_path();
    let output = run_cli(&["-e", "--max-evolutions", "2", "--json", &inventory]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["plan"]["evolutions"]["max_evolutions"], 2);
    assert_eq!(ids(&value["report"]["evolved"]), vec!["1001", "1002"]);
    assert_eq!(value["report"]["evolve_end"], "cap reached");
    assert_eq!(value["report"]["transfer_end"], "disabled");
}

#[test]
fn cli_prints_progress_and_summary_in_text_mode() {
    let inventory = inventory_path();
    let output = run_cli(&["--transfer", &inventory]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("transferring pokemon: Pidgey"));
    assert!(stdout.contains("transferring pokemon: Magikarp"));
    assert!(stdout.contains("Run summary"));
    assert!(stdout.contains("transferred: 4 (exhausted)"));
}

#[test]
fn cli_rejects_allow_and_deny_lists_together() {
    let inventory = inventory_path();
    let output = run_cli(&[
        "--white-list",
        "pidgey",
        "--black-list",
        "rattata",
        "--transfer",
        &inventory,
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ConflictingFilter"));
}

#[test]
fn cli_reads_settings_from_config_file() {
    let config = temp_path("pokeiv_config", "json");
    std::fs::write(
        &config,
        r#"{ "username": "someone", "max_evolutions": "5", "black_list": "Pidgey" }"#,
    )
    .expect("config should be writable");
    let config_arg = config.to_string_lossy().to_string();

    let inventory = inventory_path();
    let output = run_cli(&["--config", &config_arg, "--transfer", "--json", &inventory]);
    let _ = std::fs::remove_file(&config);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["plan"]["evolutions"]["max_evolutions"], 5);
    assert_eq!(
        ids(&value["report"]["transferred"]),
        vec!["1008", "1010", "1007"]
    );
}

#[test]
fn cli_writes_mutation_journal() {
    let journal = temp_path("pokeiv_journal", "json");
    let journal_arg = journal.to_string_lossy().to_string();

    let inventory = inventory_path();
    let output = run_cli(&[
        "--evolve",
        "--max-evolutions",
        "1",
        "--transfer",
        "--output",
        &journal_arg,
        &inventory,
    ]);
    assert!(output.status.success());

    let text = std::fs::read_to_string(&journal).expect("journal should be written");
    let _ = std::fs::remove_file(&journal);
    let value: Value = serde_json::from_str(&text).expect("journal should be json");
    let mutations = value["mutations"].as_array().expect("mutations array");
    assert_eq!(mutations.len(), 5);
    assert_eq!(mutations[0]["action"], "evolve");
    assert_eq!(mutations[0]["id"], "1001");
    assert!(mutations[1..].iter().all(|m| m["action"] == "release"));
}

#[test]
fn cli_reports_empty_inventory() {
    let inventory = temp_path("pokeiv_empty", "json");
    std::fs::write(&inventory, r#"{ "items": [ { "pokemon_data": { "id": 1, "is_egg": true } } ] }"#)
        .expect("inventory should be writable");
    let inventory_arg = inventory.to_string_lossy().to_string();

    let output = run_cli(&[&inventory_arg]);
    let _ = std::fs::remove_file(&inventory);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "You have no pokemon..."
    );
}

#[test]
fn cli_fails_on_species_missing_from_catalog() {
    let inventory = temp_path("pokeiv_unknown", "json");
    std::fs::write(
        &inventory,
        r#"{ "items": [ { "pokemon_data": { "id": 1, "pokemon_id": 999 } } ] }"#,
    )
    .expect("inventory should be writable");
    let inventory_arg = inventory.to_string_lossy().to_string();

    let output = run_cli(&[&inventory_arg]);
    let _ = std::fs::remove_file(&inventory);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("MalformedPayload"));
}
