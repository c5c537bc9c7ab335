use std::path::PathBuf;

use regex::Regex;

use crate::malformed_lines::MalformedLines;

#[derive(Clone, Debug)]
pub(crate) struct Config {
    work_dir: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    tasks: usize,
    queue_size: usize,
    fan_in: usize,
    field_separator: char,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    malformed_lines: MalformedLines,
    entity_column: String,
    default_fields: String,
    diagnostics_capacity: usize,
}

impl Config {
    pub(crate) fn new(
        work_dir: PathBuf,
        tmp_prefix: String,
        tmp_suffix: String,
        tasks: usize,
        fan_in: usize,
        field_separator: char,
        ignore_empty: bool,
        ignore_lines: Option<Regex>,
        malformed_lines: MalformedLines,
        entity_column: String,
        default_fields: String,
    ) -> Config {
        let queue_size = 4096;
        let diagnostics_capacity = 1024;
        Config {
            work_dir,
            tmp_prefix,
            tmp_suffix,
            tasks,
            queue_size,
            fan_in,
            field_separator,
            ignore_empty,
            ignore_lines,
            malformed_lines,
            entity_column,
            default_fields,
            diagnostics_capacity,
        }
    }

    pub(crate) fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn fan_in(&self) -> usize {
        self.fan_in
    }

    pub(crate) fn field_separator(&self) -> char {
        self.field_separator
    }

    pub(crate) fn ignore_empty(&self) -> bool {
        self.ignore_empty
    }

    pub(crate) fn ignore_lines(&self) -> &Option<Regex> {
        &self.ignore_lines
    }

    pub(crate) fn malformed_lines(&self) -> MalformedLines {
        self.malformed_lines
    }

    pub(crate) fn entity_column(&self) -> &String {
        &self.entity_column
    }

    pub(crate) fn default_fields(&self) -> &String {
        &self.default_fields
    }

    pub(crate) fn diagnostics_capacity(&self) -> usize {
        self.diagnostics_capacity
    }
}

#[cfg(test)]
impl Config {
    pub(crate) fn with_malformed_lines(mut self, malformed_lines: MalformedLines) -> Config {
        self.malformed_lines = malformed_lines;
        self
    }

    pub(crate) fn with_ignore_lines(mut self, ignore_lines: Regex) -> Config {
        self.ignore_lines = Some(ignore_lines);
        self
    }

    pub(crate) fn with_ignore_empty(mut self, ignore_empty: bool) -> Config {
        self.ignore_empty = ignore_empty;
        self
    }

    pub(crate) fn with_fan_in(mut self, fan_in: usize) -> Config {
        self.fan_in = fan_in;
        self
    }
}

#[cfg(test)]
pub(crate) fn test_config(work_dir: PathBuf) -> Config {
    Config::new(
        work_dir,
        "group-".to_string(),
        ".merge".to_string(),
        2,
        500,
        ',',
        false,
        None,
        MalformedLines::Skip,
        "Symbol".to_string(),
        "Timestamp,Price,Size,Exchange,Type".to_string(),
    )
}
