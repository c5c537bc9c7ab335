use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, Context};
use command_executor::command::Command;
use tempfile::Builder;

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::merge_engine::OrderedMerge;
use crate::record_source::RecordSource;

/// Result of merging one group of input files
#[derive(Clone, Debug, Default)]
pub(crate) struct GroupOutcome {
    index: usize,
    path: Option<PathBuf>,
    header: Option<String>,
    records: usize,
    dropped: usize,
    skipped: usize,
}

impl GroupOutcome {
    pub(crate) fn failed(index: usize, skipped: usize) -> GroupOutcome {
        GroupOutcome {
            index,
            skipped,
            ..Default::default()
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Path of the intermediate file, None when the group failed
    pub(crate) fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub(crate) fn header(&self) -> Option<&String> {
        self.header.as_ref()
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped
    }

    pub(crate) fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Entity of an input file, its file name without the extension
pub(crate) fn entity_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.to_string())
}

fn open_sources(files: &[PathBuf], config: &Config, diagnostics: &Diagnostics) -> (Vec<RecordSource>, usize) {
    let mut sources = Vec::with_capacity(files.len());
    let mut skipped = 0;
    for path in files {
        let entity = match entity_name(path) {
            Some(entity) => entity,
            None => {
                diagnostics.warn(format!("Skipping {}, cannot derive an entity from the file name", path.to_string_lossy()));
                skipped += 1;
                continue;
            }
        };
        match RecordSource::open_raw(path, entity, config, diagnostics) {
            Ok(source) => sources.push(source),
            Err(e) => {
                diagnostics.warn(format!("Skipping {}, failed to open: {:#}", path.to_string_lossy(), e));
                skipped += 1;
            }
        }
    }
    (sources, skipped)
}

/// Merge one group of entity files into a new intermediate file in the work directory.
///
/// Files that cannot be opened are skipped. An error is returned only when the intermediate
/// file cannot be created or written, in which case nothing of the group is kept.
pub(crate) fn merge_group(index: usize, files: &[PathBuf], config: &Config, diagnostics: &Diagnostics) -> Result<GroupOutcome, anyhow::Error> {
    diagnostics.info(
        format!(
            "Merging group {}, {} files, thread: {}",
            index,
            files.len(),
            thread::current().name().unwrap_or("unnamed")
        )
    );

    let intermediate = Builder::new()
        .prefix(&format!("{}{:05}-", config.tmp_prefix(), index))
        .suffix(config.tmp_suffix())
        .tempfile_in(config.work_dir())
        .with_context(|| format!("create intermediate file for group {} in {}", index, config.work_dir().to_string_lossy()))?;
    let (file, path) = intermediate.keep()
        .map_err(|e| anyhow!("Failed to persist intermediate file: {}", e))?;

    let (sources, skipped) = open_sources(files, config, diagnostics);
    let mut merge = OrderedMerge::new(sources);
    let header = merge.header().cloned();
    let mut writer = BufWriter::new(file);
    let written = merge.by_ref()
        .try_for_each(|line_record| line_record.write_labeled(&mut writer, config.field_separator()))
        .and_then(|_| writer.flush());
    if let Err(e) = written {
        drop(writer);
        if let Err(remove_error) = fs::remove_file(&path) {
            diagnostics.warn(format!("Failed to remove {}: {}", path.to_string_lossy(), remove_error));
        }
        return Err(anyhow!("write {}: {}", path.to_string_lossy(), e));
    }

    let outcome = GroupOutcome {
        index,
        path: Some(path),
        header,
        records: merge.emitted(),
        dropped: merge.dropped(),
        skipped,
    };
    diagnostics.info(
        format!(
            "Finished merging group {}, records: {}, dropped lines: {}, skipped files: {}",
            index,
            outcome.records,
            outcome.dropped,
            outcome.skipped
        )
    );
    Ok(outcome)
}

/// Merges one group on the worker pool and publishes its [GroupOutcome]
pub(crate) struct GroupMergeCommand {
    index: usize,
    files: Vec<PathBuf>,
    config: Arc<Config>,
    diagnostics: Diagnostics,
    outcomes: Arc<Mutex<Vec<GroupOutcome>>>,
}

impl GroupMergeCommand {
    pub(crate) fn new(
        index: usize,
        files: Vec<PathBuf>,
        config: Arc<Config>,
        diagnostics: Diagnostics,
        outcomes: Arc<Mutex<Vec<GroupOutcome>>>,
    ) -> GroupMergeCommand {
        GroupMergeCommand {
            index,
            files,
            config,
            diagnostics,
            outcomes,
        }
    }
}

impl Command for GroupMergeCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        let outcome = match merge_group(self.index, &self.files, &self.config, &self.diagnostics) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.diagnostics.error(format!("Group {} failed and is left out of the final merge: {:#}", self.index, e));
                GroupOutcome::failed(self.index, self.files.len())
            }
        };
        self.outcomes
            .lock()
            .map_err(|e| anyhow!("Group outcomes lock poisoned: {}", e))?
            .push(outcome);
        Ok(())
    }
}
