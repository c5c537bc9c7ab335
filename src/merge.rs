use std::cmp::{max, min};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool_builder::ThreadPoolBuilder;
use regex::Regex;
use rlimit::{getrlimit, setrlimit, Resource};

use crate::config::Config;
use crate::diagnostics::{self, Diagnostics};
use crate::discovery;
use crate::final_merge;
use crate::group_merge::{GroupMergeCommand, GroupOutcome};
use crate::line_record::LineRecord;
use crate::malformed_lines::MalformedLines;

/// Descriptors kept free for everything that is not a merge input
const RESERVED_FILES: u64 = 256;

/// Summary of a completed merge
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// number of input files found
    pub input_files: usize,
    /// number of groups merged in the first phase
    pub groups: usize,
    /// groups whose intermediate file could not be produced
    pub failed_groups: usize,
    /// input files that could not be read
    pub skipped_files: usize,
    /// data records written to the output
    pub records: usize,
    /// malformed lines left out of the output
    pub dropped_lines: usize,
    /// warnings reported while merging
    pub warnings: usize,
    /// errors reported while merging
    pub errors: usize,
}

/// Result of [Merge::merge]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The input directory holds no input files, no output was written
    NoInput,
    /// The output was written
    Merged(MergeReport),
}

/// Merge per-entity record files into one file ordered by timestamp.
///
/// Every `<entity>.txt` file in the input directory holds a header line followed by lines that
/// start with a timestamp and are already ordered by it. The output starts with a header and
/// contains every record labeled with its entity, ordered by timestamp and by entity on equal
/// timestamps.
///
/// Files are merged in groups of at most `fan_in` files, concurrently, into intermediate files
/// in the work directory. The intermediate files are then merged into the output and removed.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use market_data_merge::merge::{Merge, MergeOutcome};
///
/// fn merge_quotes(input: PathBuf, work: PathBuf, output: PathBuf) -> Result<(), anyhow::Error> {
///     let mut merge = Merge::new(input, work, output);
///     // never open more than 100 input files in one merge
///     merge.with_fan_in(100);
///     // merge up to 4 groups at the same time
///     merge.with_tasks(4);
///     match merge.merge()? {
///         MergeOutcome::NoInput => println!("nothing to merge"),
///         MergeOutcome::Merged(report) => println!("merged {} records", report.records),
///     }
///     Ok(())
/// }
/// ```
pub struct Merge {
    input_dir: PathBuf,
    work_dir: PathBuf,
    output: PathBuf,
    tasks: usize,
    fan_in: usize,
    field_separator: char,
    extension: String,
    entity_column: String,
    default_fields: String,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    malformed_lines: MalformedLines,
}

impl Merge {
    /// Create a default Merge definition.
    ///
    /// * the fan-in is 500 files
    /// * the number of tasks is zero, meaning all system cores
    /// * the field separator is ','
    /// * input files are the `*.txt` files of the input directory
    /// * the output header starts with a `Symbol` column
    /// * if no input file has a header, `Timestamp,Price,Size,Exchange,Type` is used
    /// * empty lines are malformed
    /// * malformed lines are skipped, see [MalformedLines]
    ///
    /// The work directory is created when missing. The merge raises the soft file descriptor
    /// rlimit to accommodate the configured fan-in and restores it when done.
    pub fn new(input_dir: PathBuf, work_dir: PathBuf, output: PathBuf) -> Merge {
        Merge {
            input_dir,
            work_dir,
            output,
            tasks: 0,
            fan_in: 500,
            field_separator: ',',
            extension: "txt".to_string(),
            entity_column: "Symbol".to_string(),
            default_fields: "Timestamp,Price,Size,Exchange,Type".to_string(),
            ignore_empty: false,
            ignore_lines: None,
            malformed_lines: MalformedLines::Skip,
        }
    }

    /// Set the maximum number of input files a single merge opens. The default is 500
    pub fn with_fan_in(&mut self, fan_in: usize) {
        self.fan_in = fan_in;
    }

    /// Set the number of groups merged concurrently. The default is zero which will result in
    /// using all system cores. The number may be lowered to stay within the file descriptor limit
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the field separator. The default is ','
    pub fn with_field_separator(&mut self, field_separator: char) {
        self.field_separator = field_separator;
    }

    /// Set the extension of input files, without the dot. The default is "txt"
    pub fn with_extension(&mut self, extension: &str) {
        self.extension = extension.to_string();
    }

    /// Set the name of the entity column in the output header. The default is "Symbol"
    pub fn with_entity_column(&mut self, entity_column: &str) {
        self.entity_column = entity_column.to_string();
    }

    /// Set the field names written after the entity column when no input file has a header
    pub fn with_default_fields(&mut self, default_fields: &str) {
        self.default_fields = default_fields.to_string();
    }

    /// Whether empty lines are ignored. The default is false, an empty line is treated as
    /// malformed
    pub fn with_ignore_empty(&mut self, ignore_empty: bool) {
        self.ignore_empty = ignore_empty;
    }

    /// Specify which lines to ignore. Each data line matching the regex will be ignored and will
    /// not appear in the output.
    pub fn with_ignore_lines(&mut self, r: Regex) {
        self.ignore_lines = Some(r);
    }

    /// Set [MalformedLines]
    pub fn with_malformed_lines(&mut self, malformed_lines: MalformedLines) {
        self.malformed_lines = malformed_lines;
    }

    /// Merge the input files into the output file
    pub fn merge(&self) -> Result<MergeOutcome, anyhow::Error> {
        if self.fan_in == 0 {
            return Err(anyhow!("Fan-in must be at least 1"));
        }

        let files = discovery::input_files(&self.input_dir, &self.extension)?;
        if files.is_empty() {
            log::warn!("No input files found in {}", self.input_dir.to_string_lossy());
            return Ok(MergeOutcome::NoInput);
        }
        let input_files = files.len();
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("create work directory {}", self.work_dir.to_string_lossy()))?;

        let groups = discovery::partition(files, self.fan_in);
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        Self::check_descriptor_budget(self.fan_in, groups.len(), current_hard)?;
        let tasks = Self::plan_tasks(self.requested_tasks(), self.fan_in, groups.len(), current_hard);
        let required = max((tasks * self.fan_in) as u64, groups.len() as u64 + 1) + RESERVED_FILES;
        let new_soft = min(max(required, current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;

        let config = self.create_config(tasks);
        let result = Self::internal_merge(groups, &config, &self.output);

        Self::restore_rlimits(current_soft, current_hard);
        let mut report = result?;
        report.input_files = input_files;
        Ok(MergeOutcome::Merged(report))
    }

    /// Check that the output file is ordered by timestamp and entity
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        Self::internal_check(&self.output, self.field_separator)
    }

    pub(crate) fn internal_check(path: &PathBuf, field_separator: char) -> Result<bool, anyhow::Error> {
        let reader = BufReader::new(File::open(path).with_context(|| format!("path: {}", path.to_string_lossy()))?);
        let mut previous: Option<LineRecord> = None;
        // skip the header
        for line in reader.lines().skip(1) {
            let line = line.with_context(|| format!("path: {}", path.to_string_lossy()))?;
            let current = LineRecord::from_labeled(&line, field_separator)?;
            if let Some(previous) = &previous {
                if previous > &current {
                    return Ok(false);
                }
            }
            previous = Some(current);
        }
        Ok(true)
    }

    fn requested_tasks(&self) -> usize {
        if self.tasks == 0 {
            num_cpus::get()
        } else {
            self.tasks
        }
    }

    /// Number of concurrent group merges: never more than the groups, and few enough that every
    /// worker can hold `fan_in` files open within the hard descriptor limit
    pub(crate) fn plan_tasks(requested: usize, fan_in: usize, groups: usize, hard_limit: u64) -> usize {
        let within_limit = hard_limit.saturating_sub(RESERVED_FILES) / max(fan_in, 1) as u64;
        let within_limit = usize::try_from(within_limit).unwrap_or(usize::MAX);
        max(1, min(min(requested, groups), within_limit))
    }

    /// Fails when one group or the final merge needs more open files than the hard limit allows
    pub(crate) fn check_descriptor_budget(fan_in: usize, groups: usize, hard_limit: u64) -> Result<(), anyhow::Error> {
        let group_files = (fan_in as u64).saturating_add(RESERVED_FILES);
        // every intermediate file plus the output
        let final_files = (groups as u64).saturating_add(1 + RESERVED_FILES);
        if group_files > hard_limit {
            return Err(anyhow!(
                "Fan-in {} needs {} open files, the hard limit of open files is {}",
                fan_in, group_files, hard_limit
            ));
        }
        if final_files > hard_limit {
            return Err(anyhow!(
                "Merging {} groups needs {} open files, the hard limit of open files is {}, increase the fan-in",
                groups, final_files, hard_limit
            ));
        }
        Ok(())
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    /// The merge result does not depend on the limit being restored
    pub(crate) fn restore_rlimits(soft: u64, hard: u64) {
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", soft, hard);
        if let Err(e) = Self::set_rlimits(soft, hard) {
            log::warn!("Failed to restore rlimit NOFILE: {:#}", e);
        }
    }

    fn create_config(&self, tasks: usize) -> Config {
        Config::new(
            self.work_dir.clone(),
            "group-".to_string(),
            ".merge".to_string(),
            tasks,
            self.fan_in,
            self.field_separator,
            self.ignore_empty,
            self.ignore_lines.clone(),
            self.malformed_lines,
            self.entity_column.clone(),
            self.default_fields.clone(),
        )
    }

    pub(crate) fn internal_merge(groups: Vec<Vec<PathBuf>>, config: &Config, output: &PathBuf) -> Result<MergeReport, anyhow::Error> {
        let (diagnostics, consumer) = diagnostics::channel(config.diagnostics_capacity())?;
        let result = Self::merge_phases(groups, config, output, &diagnostics);
        drop(diagnostics);
        let summary = consumer.finish();
        let mut report = result?;
        report.warnings = summary.warnings;
        report.errors = summary.errors;
        Ok(report)
    }

    fn merge_phases(groups: Vec<Vec<PathBuf>>, config: &Config, output: &PathBuf, diagnostics: &Diagnostics) -> Result<MergeReport, anyhow::Error> {
        let group_count = groups.len();
        let outcomes = Self::merge_groups(groups, config, diagnostics)?;

        let header = final_merge::output_header(outcomes.iter().find_map(|o| o.header()), config);
        let intermediate: Vec<PathBuf> = outcomes.iter().filter_map(|o| o.path().cloned()).collect();
        let result = final_merge::merge_intermediate(&intermediate, &header, output, config, diagnostics);
        Self::remove_intermediate(&intermediate, diagnostics);
        let stats = result?;

        Ok(
            MergeReport {
                input_files: 0,
                groups: group_count,
                failed_groups: outcomes.iter().filter(|o| o.path().is_none()).count(),
                skipped_files: outcomes.iter().map(|o| o.skipped()).sum(),
                records: stats.records,
                dropped_lines: outcomes.iter().map(|o| o.dropped()).sum::<usize>() + stats.dropped,
                warnings: 0,
                errors: 0,
            }
        )
    }

    /// First phase. Returns once every group finished, ordered by group index.
    fn merge_groups(groups: Vec<Vec<PathBuf>>, config: &Config, diagnostics: &Diagnostics) -> Result<Vec<GroupOutcome>, anyhow::Error> {
        log::info!("Start merging {} groups, fan-in: {}, tasks: {}", groups.len(), config.fan_in(), config.tasks());
        let outcomes: Arc<Mutex<Vec<GroupOutcome>>> = Arc::new(Mutex::new(Vec::with_capacity(groups.len())));
        let shared_config = Arc::new(config.clone());
        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let mut merging_pool = thread_pool_builder
            .with_name("merging".to_string())
            .with_tasks(config.tasks())
            .with_queue_size(config.queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()?;

        for (index, files) in groups.into_iter().enumerate() {
            let command = GroupMergeCommand::new(
                index,
                files,
                shared_config.clone(),
                diagnostics.clone(),
                outcomes.clone(),
            );
            merging_pool.submit(Box::new(command));
        }

        log::info!("Waiting for group merges to complete");
        merging_pool.shutdown();
        merging_pool.join()?;

        let mut outcomes = {
            let mut guard = outcomes.lock().map_err(|e| anyhow!("Group outcomes lock poisoned: {}", e))?;
            std::mem::take(&mut *guard)
        };
        outcomes.sort_by_key(|o| o.index());
        log::info!("Finished merging groups");
        Ok(outcomes)
    }

    fn remove_intermediate(files: &[PathBuf], diagnostics: &Diagnostics) {
        for path in files {
            if let Err(e) = fs::remove_file(path) {
                diagnostics.warn(format!("Failed to remove intermediate file {}: {}", path.to_string_lossy(), e));
            }
        }
    }
}
