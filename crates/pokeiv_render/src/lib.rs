use std::fmt::Write as _;

use pokeiv_core::core_api::{
    DEFAULT_MAX_EVOLUTIONS, ExecutionReport, FailureRecord, FamilyOutlook, Individual, LoopEnd,
    MutationKind, MutationRecord, Phase, Plan, order_by_quality_desc,
};
use serde_json::{Map as JsonMap, Value as JsonValue};

const RULE: &str = "------------";
const NAME_COL_WIDTH: usize = 10;
const POWER_COL_WIDTH: usize = 6;
const QUALITY_COL_WIDTH: usize = 8;
const MUTATION_LABEL_WIDTH: usize = 30;

pub const EMPTY_INVENTORY_MESSAGE: &str = "You have no pokemon...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRenderOptions {
    /// Adds ids and the three substats to every individual row.
    pub verbose: bool,
    pub max_evolutions: u32,
}

impl Default for TextRenderOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            max_evolutions: DEFAULT_MAX_EVOLUTIONS,
        }
    }
}

pub fn render_plan_text(plan: &Plan, options: TextRenderOptions) -> String {
    let mut out = String::new();

    let mut keep = plan.selection.keep.clone();
    order_by_quality_desc(&mut keep);
    let mut surplus = plan.selection.surplus.clone();
    order_by_quality_desc(&mut surplus);

    write_individual_table(&mut out, "Highest IV Pokemon", &keep, options);
    if !surplus.is_empty() {
        write_individual_table(&mut out, "May be transfered", &surplus, options);
    }

    if !plan.outlook.is_empty() {
        writeln!(&mut out, "{}", heading("Available evolutions"))
            .expect("writing to String cannot fail");
        let total = format!(
            "TOTAL: {} / {}",
            format_count(plan.outlook.total()),
            options.max_evolutions
        );
        writeln!(&mut out, "{}", heading(&total)).expect("writing to String cannot fail");
        writeln!(
            &mut out,
            "{:<10} {:<25} {:<16} {}",
            "[pokemon]", "[# of evolutions possible]", "[# in inventory]", "[# needed]"
        )
        .expect("writing to String cannot fail");
        for family in plan.outlook.iter() {
            writeln!(
                &mut out,
                "{:<10} {:<25} {:<16} {}",
                family.name,
                format_count(family.affordable),
                family.base_forms,
                format_count(family.deficit())
            )
            .expect("writing to String cannot fail");
        }
    }

    out
}

pub fn render_plan_json(plan: &Plan, options: TextRenderOptions, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(plan_json(plan, options)),
    }
}

/// One progress line for a confirmed mutation, as printed while a run is
/// in flight.
pub fn render_mutation_line(record: &MutationRecord) -> String {
    let verb = match record.kind {
        MutationKind::Evolve => "evolving pokemon",
        MutationKind::Release => "transferring pokemon",
    };
    format!(
        "{:<width$} {:<5} {}",
        format!("{verb}: {}", record.name),
        record.power,
        format_percent(record.quality),
        width = MUTATION_LABEL_WIDTH
    )
}

pub fn render_report_text(report: &ExecutionReport) -> String {
    let mut out = String::new();

    writeln!(&mut out, "{}", heading("Run summary")).expect("writing to String cannot fail");
    writeln!(
        &mut out,
        "evolved: {} ({})",
        report.evolved.len(),
        loop_end_label(report.evolve_end)
    )
    .expect("writing to String cannot fail");
    for record in &report.evolved {
        writeln!(&mut out, "  {}", record_row(record)).expect("writing to String cannot fail");
    }
    writeln!(
        &mut out,
        "transferred: {} ({})",
        report.transferred.len(),
        loop_end_label(report.transfer_end)
    )
    .expect("writing to String cannot fail");
    for record in &report.transferred {
        writeln!(&mut out, "  {}", record_row(record)).expect("writing to String cannot fail");
    }

    for failure in &report.failures {
        writeln!(
            &mut out,
            "failed while {}: {} #{} ({}): {}",
            phase_label(failure.phase),
            failure.name,
            failure.species_id,
            failure.id,
            failure.message
        )
        .expect("writing to String cannot fail");
    }

    out
}

pub fn render_report_json(report: &ExecutionReport, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(report_json(report)),
    }
}

pub fn loop_end_label(end: LoopEnd) -> &'static str {
    match end {
        LoopEnd::Disabled => "disabled",
        LoopEnd::Exhausted => "exhausted",
        LoopEnd::CapReached => "cap reached",
        LoopEnd::Failed => "failed",
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Evolving => "evolving",
        Phase::Transferring => "transferring",
        Phase::Done => "done",
    }
}

fn heading(title: &str) -> String {
    format!("{RULE:<15} {title:^20} {RULE:>15}")
}

fn write_individual_table(
    out: &mut String,
    title: &str,
    individuals: &[Individual],
    options: TextRenderOptions,
) {
    writeln!(out, "{}", heading(title)).expect("writing to String cannot fail");
    if options.verbose {
        writeln!(
            out,
            "{:<NAME_COL_WIDTH$} {:<POWER_COL_WIDTH$} {:<QUALITY_COL_WIDTH$} {:<13} {}",
            "[pokemon]", "[cp]", "[iv]", "[sta/atk/def]", "[id]"
        )
        .expect("writing to String cannot fail");
    } else {
        writeln!(
            out,
            "{:<NAME_COL_WIDTH$} {:<POWER_COL_WIDTH$} {}",
            "[pokemon]", "[cp]", "[iv]"
        )
        .expect("writing to String cannot fail");
    }

    for individual in individuals {
        let quality = format_percent(individual.quality());
        if options.verbose {
            let substats = format!(
                "{}/{}/{}",
                individual.stamina, individual.attack, individual.defense
            );
            writeln!(
                out,
                "{:<NAME_COL_WIDTH$} {:<POWER_COL_WIDTH$} {:<QUALITY_COL_WIDTH$} {:<13} {}",
                individual.name, individual.power, quality, substats, individual.id
            )
            .expect("writing to String cannot fail");
        } else {
            writeln!(
                out,
                "{:<NAME_COL_WIDTH$} {:<POWER_COL_WIDTH$} {}",
                individual.name, individual.power, quality
            )
            .expect("writing to String cannot fail");
        }
    }
}

fn record_row(record: &MutationRecord) -> String {
    format!(
        "{:<NAME_COL_WIDTH$} {:<POWER_COL_WIDTH$} {:<QUALITY_COL_WIDTH$} {}",
        record.name,
        record.power,
        format_percent(record.quality),
        record.id
    )
}

fn plan_json(plan: &Plan, options: TextRenderOptions) -> JsonMap<String, JsonValue> {
    let mut keep = plan.selection.keep.clone();
    order_by_quality_desc(&mut keep);
    let mut surplus = plan.selection.surplus.clone();
    order_by_quality_desc(&mut surplus);

    let mut out = JsonMap::new();
    out.insert("keep".to_string(), individuals_to_json(&keep));
    out.insert("surplus".to_string(), individuals_to_json(&surplus));

    let mut evolutions = JsonMap::new();
    evolutions.insert(
        "total".to_string(),
        JsonValue::from(plan.outlook.total()),
    );
    evolutions.insert(
        "max_evolutions".to_string(),
        JsonValue::from(options.max_evolutions),
    );
    evolutions.insert(
        "families".to_string(),
        JsonValue::Array(plan.outlook.iter().map(family_to_json).collect()),
    );
    out.insert("evolutions".to_string(), JsonValue::Object(evolutions));
    out
}

fn individuals_to_json(individuals: &[Individual]) -> JsonValue {
    JsonValue::Array(
        individuals
            .iter()
            .map(|individual| {
                let mut m = JsonMap::new();
                m.insert(
                    "id".to_string(),
                    JsonValue::String(individual.id.to_string()),
                );
                m.insert(
                    "species_id".to_string(),
                    JsonValue::from(individual.species_id),
                );
                m.insert(
                    "name".to_string(),
                    JsonValue::String(individual.name.clone()),
                );
                m.insert(
                    "family_id".to_string(),
                    JsonValue::from(individual.family_id),
                );
                m.insert("cp".to_string(), JsonValue::from(individual.power));
                m.insert("stamina".to_string(), JsonValue::from(individual.stamina));
                m.insert("attack".to_string(), JsonValue::from(individual.attack));
                m.insert("defense".to_string(), JsonValue::from(individual.defense));
                m.insert("iv".to_string(), JsonValue::from(individual.quality()));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn family_to_json(family: &FamilyOutlook) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("family_id".to_string(), JsonValue::from(family.family_id));
    m.insert("name".to_string(), JsonValue::String(family.name.clone()));
    m.insert("unit_cost".to_string(), JsonValue::from(family.unit_cost));
    m.insert("balance".to_string(), JsonValue::from(family.balance));
    m.insert("affordable".to_string(), JsonValue::from(family.affordable));
    m.insert("in_inventory".to_string(), JsonValue::from(family.base_forms));
    m.insert("needed".to_string(), JsonValue::from(family.deficit()));
    m.insert("realizable".to_string(), JsonValue::from(family.realizable()));
    JsonValue::Object(m)
}

fn report_json(report: &ExecutionReport) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    out.insert("evolved".to_string(), records_to_json(&report.evolved));
    out.insert(
        "evolve_end".to_string(),
        JsonValue::String(loop_end_label(report.evolve_end).to_string()),
    );
    out.insert(
        "transferred".to_string(),
        records_to_json(&report.transferred),
    );
    out.insert(
        "transfer_end".to_string(),
        JsonValue::String(loop_end_label(report.transfer_end).to_string()),
    );
    out.insert("failures".to_string(), failures_to_json(&report.failures));
    out
}

fn records_to_json(records: &[MutationRecord]) -> JsonValue {
    JsonValue::Array(
        records
            .iter()
            .map(|record| {
                let mut m = JsonMap::new();
                m.insert("id".to_string(), JsonValue::String(record.id.to_string()));
                m.insert("species_id".to_string(), JsonValue::from(record.species_id));
                m.insert("name".to_string(), JsonValue::String(record.name.clone()));
                m.insert("cp".to_string(), JsonValue::from(record.power));
                m.insert("iv".to_string(), JsonValue::from(record.quality));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn failures_to_json(failures: &[FailureRecord]) -> JsonValue {
    JsonValue::Array(
        failures
            .iter()
            .map(|failure| {
                let mut m = JsonMap::new();
                m.insert(
                    "phase".to_string(),
                    JsonValue::String(phase_label(failure.phase).to_string()),
                );
                m.insert("id".to_string(), JsonValue::String(failure.id.to_string()));
                m.insert(
                    "species_id".to_string(),
                    JsonValue::from(failure.species_id),
                );
                m.insert("name".to_string(), JsonValue::String(failure.name.clone()));
                m.insert(
                    "message".to_string(),
                    JsonValue::String(failure.message.clone()),
                );
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn format_count(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_centres_title_between_rules() {
        assert_eq!(
            heading("Run summary"),
            "------------        Run summary         ------------"
        );
    }

    #[test]
    fn percent_uses_two_decimals() {
        assert_eq!(format_percent(1.0), "100.00%");
        assert_eq!(format_percent(30.0 / 45.0), "66.67%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn loop_end_labels_are_distinct() {
        let labels = [
            loop_end_label(LoopEnd::Disabled),
            loop_end_label(LoopEnd::Exhausted),
            loop_end_label(LoopEnd::CapReached),
            loop_end_label(LoopEnd::Failed),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
