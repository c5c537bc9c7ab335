use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::line_layout::LineLayout;
use crate::line_record::LineRecord;
use crate::malformed_lines::MalformedLines;

/// A forward only stream of records read from one file.
///
/// The file is closed as soon as the end of the stream is reached. A read error ends the
/// stream with a warning, it is never propagated to the caller.
#[derive(Debug)]
pub(crate) struct RecordSource {
    path: PathBuf,
    entity: String,
    layout: LineLayout,
    reader: Option<BufReader<File>>,
    header_pending: bool,
    header: Option<String>,
    line_number: usize,
    produced: bool,
    dropped: usize,
    field_separator: char,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    malformed_lines: MalformedLines,
    diagnostics: Diagnostics,
}

impl RecordSource {
    /// Open an entity file, every record is labeled with `entity`
    pub(crate) fn open_raw(path: &Path, entity: String, config: &Config, diagnostics: &Diagnostics) -> Result<RecordSource, anyhow::Error> {
        Self::open(path, entity, LineLayout::Raw, config, diagnostics)
    }

    /// Open an intermediate file, the entity is read from each line
    pub(crate) fn open_labeled(path: &Path, config: &Config, diagnostics: &Diagnostics) -> Result<RecordSource, anyhow::Error> {
        Self::open(path, String::new(), LineLayout::Labeled, config, diagnostics)
    }

    fn open(path: &Path, entity: String, layout: LineLayout, config: &Config, diagnostics: &Diagnostics) -> Result<RecordSource, anyhow::Error> {
        let file = File::open(path).with_context(|| format!("path: {}", path.to_string_lossy()))?;
        Ok(
            RecordSource {
                path: path.to_path_buf(),
                entity,
                layout,
                reader: Some(BufReader::new(file)),
                header_pending: layout.has_header(),
                header: None,
                line_number: 0,
                produced: false,
                dropped: 0,
                field_separator: config.field_separator(),
                ignore_empty: config.ignore_empty(),
                ignore_lines: config.ignore_lines().clone(),
                malformed_lines: config.malformed_lines(),
                diagnostics: diagnostics.clone(),
            }
        )
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// The header line, available once the first record was requested
    pub(crate) fn header(&self) -> Option<&String> {
        self.header.as_ref()
    }

    /// Number of malformed lines dropped so far
    pub(crate) fn dropped(&self) -> usize {
        self.dropped
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.reader.is_none()
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let result = match self.reader.as_mut() {
            Some(reader) => reader.read_line(&mut line),
            None => return None,
        };
        match result {
            Ok(0) => {
                self.close();
                None
            }
            Ok(_) => {
                self.line_number += 1;
                let trimmed = line.trim_end_matches(&['\n', '\r'][..]).len();
                line.truncate(trimmed);
                Some(line)
            }
            Err(e) => {
                self.diagnostics.warn(
                    format!(
                        "Failed to read {} after line {}, ignoring the rest of the file: {}",
                        self.path.to_string_lossy(),
                        self.line_number,
                        e
                    )
                );
                self.close();
                None
            }
        }
    }

    fn is_ignored(&self, line: &str) -> bool {
        if self.ignore_empty && line.trim().is_empty() {
            return true;
        }
        match &self.ignore_lines {
            Some(r) => r.is_match(line),
            None => false,
        }
    }

    fn parse(&self, line: &str) -> Result<LineRecord, anyhow::Error> {
        match self.layout {
            LineLayout::Raw => LineRecord::from_raw(line, &self.entity, self.field_separator),
            LineLayout::Labeled => LineRecord::from_labeled(line, self.field_separator),
        }
    }
}

impl Iterator for RecordSource {
    type Item = LineRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.header_pending {
            self.header_pending = false;
            self.header = self.read_line();
        }

        loop {
            let line = self.read_line()?;
            if self.is_ignored(&line) {
                continue;
            }
            match self.parse(&line) {
                Ok(line_record) => {
                    self.produced = true;
                    return Some(line_record);
                }
                Err(e) if !self.produced => {
                    self.dropped += 1;
                    self.diagnostics.warn(
                        format!(
                            "Malformed first data line {} of {}, skipping the file: {}",
                            self.line_number,
                            self.path.to_string_lossy(),
                            e
                        )
                    );
                    self.close();
                    return None;
                }
                Err(e) => {
                    self.dropped += 1;
                    match self.malformed_lines {
                        MalformedLines::Skip => {
                            self.diagnostics.warn(
                                format!(
                                    "Dropped malformed line {} of {}: {}",
                                    self.line_number,
                                    self.path.to_string_lossy(),
                                    e
                                )
                            );
                        }
                        MalformedLines::EndSource => {
                            self.diagnostics.warn(
                                format!(
                                    "Malformed line {} of {}, ignoring the rest of the file: {}",
                                    self.line_number,
                                    self.path.to_string_lossy(),
                                    e
                                )
                            );
                            self.close();
                            return None;
                        }
                    }
                }
            }
        }
    }
}
