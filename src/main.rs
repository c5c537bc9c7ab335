use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use market_data_merge::malformed_lines::MalformedLines;
use market_data_merge::merge::{Merge, MergeOutcome};

/// Merge per-entity, timestamp ordered files into one file ordered by timestamp
#[derive(Parser, Debug)]
#[command(name = "market-data-merge", version)]
struct Cli {
    /// Directory holding one <entity>.txt file per entity
    input_dir: PathBuf,
    /// Directory for intermediate files, created when missing
    work_dir: PathBuf,
    /// Output file
    output: PathBuf,
    /// Maximum number of files a single merge keeps open
    #[arg(long, default_value_t = 500)]
    fan_in: usize,
    /// Number of groups merged concurrently, 0 for all cores
    #[arg(long, default_value_t = 0)]
    tasks: usize,
    /// Name of the entity column in the output header
    #[arg(long, default_value = "Symbol")]
    entity_column: String,
    /// Ignore the rest of a file after its first malformed line
    #[arg(long)]
    strict: bool,
    /// Verify the ordering of the output after merging
    #[arg(long)]
    check: bool,
    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let mut merge = Merge::new(cli.input_dir, cli.work_dir, cli.output.clone());
    merge.with_fan_in(cli.fan_in);
    merge.with_tasks(cli.tasks);
    merge.with_entity_column(&cli.entity_column);
    if cli.strict {
        merge.with_malformed_lines(MalformedLines::EndSource);
    }

    match merge.merge()? {
        MergeOutcome::NoInput => {
            log::info!("Nothing to merge");
        }
        MergeOutcome::Merged(report) => {
            log::info!(
                "Merging completed successfully, input files: {}, records: {}, dropped lines: {}, skipped files: {}, failed groups: {}, warnings: {}",
                report.input_files,
                report.records,
                report.dropped_lines,
                report.skipped_files,
                report.failed_groups,
                report.warnings,
            );
            if cli.check {
                if merge.check()? {
                    log::info!("{} is ordered", cli.output.to_string_lossy());
                } else {
                    return Err(anyhow::anyhow!("{} is not ordered", cli.output.to_string_lossy()));
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(cli.log_level).env().init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
