use admission_letters::analyzer::SelectionSummary;
use admission_letters::{telemetry, AdmissionPipeline, Config, RunOutcome};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use tracing::{error, info};

fn cli() -> Command {
    Command::new("admission-letters")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Selects admitted students and generates their welcome letters")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(value_parser!(PathBuf))
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .help("Write the default configuration to the config path and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("workspace")
                .short('w')
                .long("workspace")
                .value_name("DIR")
                .help("Directory holding project_assets/ and the generated folders")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("skip-download")
                .long("skip-download")
                .help("Reuse the already extracted dataset")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-report")
                .long("no-report")
                .help("Only write letters, no admission spreadsheet")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("Seed for synthetic names, making letter filenames reproducible")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("vacancies")
                .long("vacancies")
                .value_name("N")
                .help("Number of places to fill")
                .value_parser(value_parser!(usize)),
        )
}

fn load_config(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        let config = Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((Config::default(), false))
    }
}

fn apply_overrides(config: &mut Config, matches: &clap::ArgMatches) {
    if let Some(workspace) = matches.get_one::<PathBuf>("workspace") {
        config.paths.workspace = workspace.clone();
    }
    if matches.get_flag("skip-download") {
        config.dataset.skip_download = true;
    }
    if matches.get_flag("no-report") {
        config.report.enabled = false;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.name_seed = Some(*seed);
    }
    if let Some(vacancies) = matches.get_one::<usize>("vacancies") {
        config.admission.vacancies = *vacancies;
    }
}

fn print_summary(outcome: &RunOutcome) {
    let summary: &SelectionSummary = &outcome.summary;
    println!("\n📊 SUMMARY");
    println!("==========");
    println!("Applicants read:      {}", summary.total_applicants);
    println!("Met all thresholds:   {}", summary.qualified_applicants);
    println!("Admitted:             {} of {} places", summary.admitted, summary.vacancies);
    if let (Some(top), Some(cutoff)) = (summary.top_total_score, summary.cutoff_total_score) {
        println!("Total score range:    {} - {}", cutoff, top);
    }
    println!("\n✅ Student letters created at: {}", outcome.letters_dir.display());
    if let Some(report) = &outcome.report_path {
        println!("📄 Admission list: {}", report.display());
    }
    if let Some(csv) = &outcome.csv_report_path {
        println!("📄 Admission list (csv): {}", csv.display());
    }
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    if matches.get_flag("init-config") {
        Config::default()
            .save_to_file(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("📝 Default configuration written to {}", config_path.display());
        return Ok(());
    }

    let (mut config, from_file) = load_config(&config_path)?;
    apply_overrides(&mut config, &matches);
    config.validate()?;

    telemetry::init(&config.log_level).context("Failed to initialise logging")?;
    if from_file {
        info!(path = %config_path.display(), "configuration loaded");
    } else {
        info!(path = %config_path.display(), "no configuration file, using defaults");
    }

    let today = Local::now().date_naive();
    let pipeline = AdmissionPipeline::new(config, today);
    let outcome = match pipeline.run() {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "admission run failed");
            return Err(err).context("Admission run failed");
        }
    };

    print_summary(&outcome);
    Ok(())
}
