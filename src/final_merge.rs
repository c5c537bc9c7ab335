use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tempfile::Builder;

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::merge_engine::OrderedMerge;
use crate::record_source::RecordSource;

/// Counts of the final merge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FinalStats {
    pub(crate) records: usize,
    pub(crate) dropped: usize,
}

/// Header of the final output: the entity column followed by the input header
pub(crate) fn output_header(input_header: Option<&String>, config: &Config) -> String {
    let fields = input_header.unwrap_or(config.default_fields());
    format!("{}{}{}", config.entity_column(), config.field_separator(), fields)
}

/// Merge the intermediate files of all groups into `output`.
///
/// The output is written next to its final location and renamed onto it once complete.
/// Intermediate files that are missing or hold no records are skipped with a warning.
pub(crate) fn merge_intermediate(
    files: &[PathBuf],
    header: &str,
    output: &Path,
    config: &Config,
    diagnostics: &Diagnostics,
) -> Result<FinalStats, anyhow::Error> {
    log::info!("Merging {} intermediate files into {}", files.len(), output.to_string_lossy());
    let output_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let merged_file = Builder::new()
        .prefix(".merging-")
        .tempfile_in(&output_dir)
        .with_context(|| format!("create output in {}", output_dir.to_string_lossy()))?;

    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        match RecordSource::open_labeled(path, config, diagnostics) {
            Ok(source) => sources.push(source),
            Err(e) => diagnostics.warn(format!("Skipping intermediate file {}: {:#}", path.to_string_lossy(), e)),
        }
    }
    let mut merge = OrderedMerge::new(sources);
    for source in merge.empty_sources() {
        diagnostics.warn(format!("Skipping empty intermediate file {}", source.path().to_string_lossy()));
    }

    let mut merged_writer = BufWriter::new(merged_file);
    writeln!(merged_writer, "{}", header)
        .with_context(|| format!("write header to {}", output.to_string_lossy()))?;
    for line_record in merge.by_ref() {
        line_record.write_labeled(&mut merged_writer, config.field_separator())
            .with_context(|| format!("write {}", output.to_string_lossy()))?;
    }
    let merged_file = merged_writer.into_inner()
        .map_err(|e| anyhow!("flush {}: {}", output.to_string_lossy(), e.error()))?;
    merged_file.persist(output)
        .map_err(|e| anyhow!("Rename merged file to {}: {}", output.to_string_lossy(), e.error))?;

    let stats = FinalStats {
        records: merge.emitted(),
        dropped: merge.dropped(),
    };
    log::info!("Finished final merge, records: {}", stats.records);
    Ok(stats)
}
