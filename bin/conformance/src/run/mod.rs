use anyhow::Context;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use webserv_harness::{collect_feature_files, Feature, FeatureReport, HarnessConfig, ScenarioRunner};

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("run")
            .about("runs feature files, or every .feature file under the given directories")
            .arg(
                clap::Arg::new("paths")
                    .required(true)
                    .num_args(1..)
                    .action(clap::ArgAction::Append)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                clap::Arg::new("config")
                    .long("config")
                    .help("path to a conformance.toml, defaults to the one in the current directory")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                clap::Arg::new("fixtures")
                    .long("fixtures")
                    .help("directory fixture names are resolved against")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                clap::Arg::new("chunk_size")
                    .long("chunk_size")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("tags")
                    .long("tags")
                    .help("only run scenarios carrying one of these tags")
                    .action(clap::ArgAction::Append)
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                clap::Arg::new("log_level")
                    .long("log_level")
                    .action(clap::ArgAction::Set)
                    .value_parser(["trace", "debug", "info", "warn", "error"]),
            )
            .arg_required_else_help(true),
    )
}

/// Returns whether every selected scenario passed.
pub fn run(args: &clap::ArgMatches) -> anyhow::Result<bool> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => HarnessConfig::from_path(path.clone())
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::discover(&std::env::current_dir()?)?,
    };

    if let Some(fixtures) = args.get_one::<PathBuf>("fixtures") {
        config = config.fixtures_dir(fixtures.clone());
    }
    if let Some(chunk_size) = args.get_one::<usize>("chunk_size") {
        anyhow::ensure!(*chunk_size > 0, "chunk_size must be greater than zero");
        config = config.chunk_size(*chunk_size);
    }
    if let Some(level) = args.get_one::<String>("log_level") {
        config.log_level.clone_from(level);
    }

    setup_tracing(&config)?;
    tracing::info!("Fixtures resolved against {}", config.fixtures_dir.display());

    let paths: Vec<PathBuf> = args
        .get_many::<PathBuf>("paths")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let files = collect_feature_files(&paths)?;
    anyhow::ensure!(!files.is_empty(), "no .feature files found");

    let tags: Vec<String> = args
        .get_many::<String>("tags")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let runner = ScenarioRunner::new(&config).only_tags(tags);

    let mut reports = Vec::with_capacity(files.len());
    let mut broken = 0;
    for file in &files {
        match Feature::from_path(file) {
            Ok(feature) => {
                let report = runner.run_feature(&feature);
                print_report(&report);
                reports.push(report);
            }
            Err(err) => {
                tracing::error!("Unable to parse feature file: {err}");
                println!("{err}");
                broken += 1;
            }
        }
    }

    let passed: usize = reports.iter().map(FeatureReport::passed).sum();
    let failed: usize = reports.iter().map(FeatureReport::failed).sum();
    let undefined: usize = reports.iter().map(FeatureReport::undefined).sum();
    let skipped: usize = reports.iter().map(FeatureReport::skipped).sum();
    println!(
        "\n{} features, {passed} passed, {failed} failed, {undefined} undefined, {skipped} skipped",
        files.len()
    );
    if broken > 0 {
        println!("{broken} feature files could not be parsed");
    }

    Ok(broken == 0 && reports.iter().all(FeatureReport::is_success))
}

fn print_report(report: &FeatureReport) {
    match &report.path {
        Some(path) => println!("\nFeature: {} ({})", report.name, path.display()),
        None => println!("\nFeature: {}", report.name),
    }
    for outcome in &report.scenarios {
        println!("  {outcome}");
    }
}

fn setup_tracing(config: &HarnessConfig) -> anyhow::Result<()> {
    let level: Level = config
        .log_level
        .parse()
        .with_context(|| format!("invalid log level {:?}", config.log_level))?;

    let builder = FmtSubscriber::builder().with_max_level(level);
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let subscriber = builder.with_ansi(false).with_writer(Mutex::new(file)).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
