//! This crate merges many per-entity, timestamp ordered record files into one file ordered by
//! timestamp, without ever opening more files at once than configured.
//!
//! Each input file is named after its entity, for example `MSFT.txt`, and holds a header line
//! followed by comma separated lines whose first field is a timestamp that sorts as a string,
//! such as `2021-03-05 10:00:00.123`. Lines within a file are already ordered by timestamp.
//! The output labels every line with its entity:
//!
//! ```text
//! Symbol,Timestamp,Price,Size,Exchange,Type
//! CSCO,2021-03-05 10:00:00.123,46.14,120,NYSE_ARCA,Ask
//! MSFT,2021-03-05 10:00:00.123,228.5,120,NYSE,Ask
//! CSCO,2021-03-05 10:00:00.130,46.13,120,NYSE,TRADE
//! MSFT,2021-03-05 10:00:00.133,228.5,120,NYSE,TRADE
//! ```
//!
//! Records with equal timestamps are ordered by entity, so the output is the same on every run.
//!
//! The merge runs in two phases. The input files are split into groups of at most `fan_in`
//! files and every group is k-way merged into an intermediate file, with groups merged
//! concurrently on a thread pool. When all groups are done, the intermediate files are merged
//! into the output and removed. Unreadable files and malformed lines are reported as warnings
//! and left out; they never stop the merge. A file whose first data line is malformed is left
//! out entirely.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use market_data_merge::merge::{Merge, MergeOutcome};
//!
//! fn merge_quotes(input: PathBuf, work: PathBuf, output: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut merge = Merge::new(input, work, output);
//!
//!     // the number of files a single merge keeps open. Groups of this size are merged
//!     // concurrently, so keep it well below the file descriptor limit.
//!     merge.with_fan_in(500);
//!
//!     // the number of groups merged at the same time. The default is to use all available
//!     // cores.
//!     merge.with_tasks(2);
//!
//!     if let MergeOutcome::Merged(report) = merge.merge()? {
//!         log::info!("merged {} records, dropped {} lines", report.records, report.dropped_lines);
//!     }
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod diagnostics;
pub(crate) mod discovery;
pub(crate) mod final_merge;
pub(crate) mod group_merge;
pub(crate) mod key;
pub(crate) mod line_layout;
pub(crate) mod line_record;
pub(crate) mod merge_engine;
pub(crate) mod record_source;

pub mod merge;
pub mod malformed_lines;
