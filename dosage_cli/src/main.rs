use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dosage_core::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dosecalc")]
#[command(about = "Rule-based drug dose calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $XDG_CONFIG_HOME/dosecalc/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override rule table directory
    #[arg(long, global = true)]
    rules_dir: Option<PathBuf>,

    /// Override clinical records file
    #[arg(long, global = true)]
    records: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate a dose for a patient
    Calculate {
        /// Patient UUID
        #[arg(long)]
        patient: String,

        /// Visit UUID the measurements are taken from
        #[arg(long)]
        visit: String,

        /// Drug name as written in the rule table
        #[arg(long)]
        drug: String,

        /// Order set whose rule table to use
        #[arg(long)]
        order_set: String,

        /// Rule to start from
        #[arg(long, default_value = CSV_RULE)]
        rule: String,

        /// Compute patient age as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Print the dose as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the rows of an order set's rule table
    Rules {
        #[arg(long)]
        order_set: String,
    },

    /// List registered rule identifiers
    Registry,
}

fn main() -> ExitCode {
    // Initialize logging
    dosage_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = cli.rules_dir {
        config.rules.dir = dir;
    }
    if let Some(path) = cli.records {
        config.records.path = path;
    }

    match cli.command {
        Commands::Calculate {
            patient,
            visit,
            drug,
            order_set,
            rule,
            as_of,
            json,
        } => {
            let request = DosageRequest::new(patient, visit, drug, order_set);
            cmd_calculate(&config, &request, &rule, as_of, json)
        }
        Commands::Rules { order_set } => cmd_rules(&config, &order_set),
        Commands::Registry => cmd_registry(&config),
    }
}

fn load_records(config: &Config, as_of: Option<NaiveDate>) -> Result<RecordStore> {
    let path = &config.records.path;
    let store = if path.exists() {
        RecordStore::load_from(path)?
    } else {
        tracing::warn!("No records file at {:?}", path);
        RecordStore::new()
    };

    Ok(match as_of {
        Some(date) => store.with_reference_date(date),
        None => store,
    })
}

fn cmd_calculate(
    config: &Config,
    request: &DosageRequest,
    rule: &str,
    as_of: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let records = Arc::new(load_records(config, as_of)?);
    let engine = RulesEngine::standard(config, records);

    let dose = engine.calculate_dose_with(rule, request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dose)?);
    } else {
        println!("{}", dose);
    }
    Ok(())
}

fn cmd_rules(config: &Config, order_set: &str) -> Result<()> {
    let table = CsvRuleTable::new(&config.rules.dir);
    let rows = table.load(order_set)?;

    if rows.is_empty() {
        println!("No rules defined for order set '{}'", order_set);
        return Ok(());
    }

    println!(
        "{:<24} {:>7} {:>7} {:>10} {:>10}  {:<12} {:>8}",
        "Name", "Age≥", "Age<", "Weight≥", "Weight<", "Rule", "Dosage"
    );
    for row in &rows {
        println!(
            "{:<24} {:>7} {:>7} {:>10} {:>10}  {:<12} {:>8}",
            row.drug_name,
            row.min_age,
            row.max_age,
            row.min_weight,
            row.max_weight,
            row.rule,
            row.dosage
        );
    }
    Ok(())
}

fn cmd_registry(config: &Config) -> Result<()> {
    let engine = RulesEngine::standard(config, Arc::new(RecordStore::new()));
    for name in engine.registry().names() {
        println!("{}", name);
    }
    Ok(())
}
