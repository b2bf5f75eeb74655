mod config;
mod replay;

use std::path::PathBuf;
use std::process;
use std::thread;

use clap::Parser;
use pokeiv_core::core_api::{
    Engine, ExecutionReport, Plan, PlanExecutor, ReferenceCatalog, SpeciesFilter, Step,
};
use pokeiv_render::{
    EMPTY_INVENTORY_MESSAGE, JsonStyle, TextRenderOptions, render_mutation_line, render_plan_json,
    render_plan_text, render_report_json, render_report_text,
};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing_subscriber::EnvFilter;

use crate::config::{FlagValues, load_config, resolve};
use crate::replay::ReplayService;

const DEFAULT_CATALOG_DIR: &str = "data";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Saved inventory payload to plan against.
    #[arg(value_name = "INVENTORY.json")]
    inventory: PathBuf,
    /// Keep every individual at or above this IV percentage.
    #[arg(short = 'm', long = "minimum-iv", value_name = "PERCENT")]
    minimum_iv: Option<f64>,
    /// Keep only individuals at or above the minimum IV, even unique ones.
    #[arg(long = "hard-minimum")]
    hard_minimum: bool,
    /// Keep individuals at or above this CP regardless of IV.
    #[arg(long = "cp-override", value_name = "CP")]
    cp_override: Option<u32>,
    #[arg(long = "white-list", value_name = "SPECIES", value_delimiter = ',')]
    white_list: Vec<String>,
    #[arg(long = "black-list", value_name = "SPECIES", value_delimiter = ',')]
    black_list: Vec<String>,
    #[arg(long)]
    force: bool,
    #[arg(short = 'e', long)]
    evolve: bool,
    #[arg(short = 't', long)]
    transfer: bool,
    #[arg(long = "max-evolutions", value_name = "COUNT")]
    max_evolutions: Option<u32>,
    #[arg(long = "evolution-delay", value_name = "SECONDS")]
    evolution_delay: Option<f64>,
    #[arg(long = "transfer-delay", value_name = "SECONDS")]
    transfer_delay: Option<f64>,
    #[arg(long = "catalog-dir", value_name = "DIR")]
    catalog_dir: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long)]
    json: bool,
    #[arg(short = 'v', long)]
    verbose: bool,
    /// Write a JSON journal of confirmed mutations.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl Cli {
    fn flag_values(&self) -> FlagValues {
        FlagValues {
            minimum_iv: self.minimum_iv,
            hard_minimum: self.hard_minimum,
            cp_override: self.cp_override,
            white_list: self.white_list.clone(),
            black_list: self.black_list.clone(),
            force: self.force,
            evolve: self.evolve,
            transfer: self.transfer,
            max_evolutions: self.max_evolutions,
            evolution_delay: self.evolution_delay,
            transfer_delay: self.transfer_delay,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn warn_unknown_species(catalog: &ReferenceCatalog, filter: &SpeciesFilter) {
    let tokens = match filter {
        SpeciesFilter::All => return,
        SpeciesFilter::Allow(tokens) | SpeciesFilter::Deny(tokens) => tokens,
    };
    for token in tokens {
        if catalog.resolve(token).is_none() {
            tracing::warn!(species = %token, "filter.unknown_species");
        }
    }
}

fn run_executor(
    executor: &mut PlanExecutor,
    service: &mut ReplayService,
    print_progress: bool,
) -> ExecutionReport {
    loop {
        match executor.step(service) {
            Ok(Step::Mutated { record, pause }) => {
                if print_progress {
                    println!("{}", render_mutation_line(&record));
                }
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
            }
            Ok(Step::Finished(report)) => return report,
            // The loop that failed is over; keep stepping into the next one.
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

fn combined_json(plan: &Plan, options: TextRenderOptions, report: &ExecutionReport) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "plan".to_string(),
        render_plan_json(plan, options, JsonStyle::CanonicalV1),
    );
    out.insert(
        "report".to_string(),
        render_report_json(report, JsonStyle::CanonicalV1),
    );
    JsonValue::Object(out)
}

fn print_json(value: &JsonValue) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error serializing JSON output: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file_config = load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error loading config: {e}");
        process::exit(2);
    });
    let settings = resolve(&cli.flag_values(), &file_config).unwrap_or_else(|e| {
        eprintln!("Error in configuration: {e}");
        process::exit(2);
    });

    let catalog_dir = cli
        .catalog_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_DIR));
    let catalog = ReferenceCatalog::load_from_dir(&catalog_dir).unwrap_or_else(|e| {
        eprintln!("Error loading species tables from {}", catalog_dir.display());
        eprintln!("  {e}");
        process::exit(1);
    });
    warn_unknown_species(&catalog, &settings.selection.filter);

    let mut service = ReplayService::from_file(&cli.inventory).unwrap_or_else(|e| {
        eprintln!("Error reading inventory: {e}");
        process::exit(1);
    });
    let session = Engine::new(catalog)
        .open_service(&mut service)
        .unwrap_or_else(|e| {
            eprintln!("Error building inventory: {}", cli.inventory.display());
            eprintln!("  {e}");
            process::exit(1);
        });

    if session.snapshot().is_empty() {
        println!("{EMPTY_INVENTORY_MESSAGE}");
        return;
    }

    let plan = session.plan(&settings.selection);
    let options = TextRenderOptions {
        verbose: cli.verbose,
        max_evolutions: settings.execution.max_evolutions,
    };
    let mutating = settings.execution.evolve || settings.execution.transfer;

    if !cli.json {
        print!("{}", render_plan_text(&plan, options));
    }

    let report = if mutating {
        let mut executor = session.executor(&plan, settings.execution);
        let report = run_executor(&mut executor, &mut service, !cli.json);
        if !cli.json {
            print!("{}", render_report_text(&report));
        }
        Some(report)
    } else {
        None
    };

    if cli.json {
        match &report {
            Some(report) => print_json(&combined_json(&plan, options, report)),
            None => print_json(&render_plan_json(&plan, options, JsonStyle::CanonicalV1)),
        }
    }

    if let Some(path) = &cli.output {
        service.write_journal(path).unwrap_or_else(|e| {
            eprintln!("Error writing journal {}: {e}", path.display());
            process::exit(1);
        });
        tracing::info!(
            path = %path.display(),
            mutations = service.journal().len(),
            "journal.written"
        );
    }

    if report.as_ref().is_some_and(ExecutionReport::has_failures) {
        process::exit(1);
    }
}
