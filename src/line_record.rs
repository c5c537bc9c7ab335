use std::cmp::Ordering;
use std::io::Write;

use anyhow::anyhow;

use crate::key::Key;

/// One data line together with its ordering key.
///
/// `fields` holds everything after the timestamp separator and is written back verbatim.
#[derive(Clone, Debug)]
pub(crate) struct LineRecord {
    key: Key,
    fields: String,
}

impl LineRecord {
    /// Parse a line of an entity file: `timestamp,fields...`. The entity comes from the file name.
    pub(crate) fn from_raw(line: &str, entity: &str, field_separator: char) -> Result<LineRecord, anyhow::Error> {
        let (timestamp, fields) = line.split_once(field_separator).ok_or_else(|| {
            anyhow!("line: {line}, error: expected timestamp and fields separated by '{field_separator}'")
        })?;
        if timestamp.is_empty() {
            return Err(anyhow!("line: {line}, error: empty timestamp"));
        }

        Ok(
            LineRecord {
                key: Key::new(timestamp.to_string(), entity.to_string()),
                fields: fields.to_string(),
            }
        )
    }

    /// Parse a line of an intermediate file: `entity,timestamp,fields...`.
    pub(crate) fn from_labeled(line: &str, field_separator: char) -> Result<LineRecord, anyhow::Error> {
        let mut parts = line.splitn(3, field_separator);
        let entity = parts.next().unwrap_or_default();
        let timestamp = parts.next();
        let fields = parts.next();
        match (timestamp, fields) {
            (Some(timestamp), Some(fields)) if !entity.is_empty() && !timestamp.is_empty() => {
                Ok(
                    LineRecord {
                        key: Key::new(timestamp.to_string(), entity.to_string()),
                        fields: fields.to_string(),
                    }
                )
            }
            _ => {
                Err(anyhow!(
                    "line: {line}, error: expected entity, timestamp and fields separated by '{field_separator}'"
                ))
            }
        }
    }

    pub(crate) fn timestamp(&self) -> &str {
        self.key.timestamp()
    }

    pub(crate) fn entity(&self) -> &str {
        self.key.entity()
    }

    pub(crate) fn fields(&self) -> &str {
        self.fields.as_str()
    }

    /// Write the record as `entity,timestamp,fields` followed by a new line
    pub(crate) fn write_labeled<W: Write>(&self, writer: &mut W, field_separator: char) -> std::io::Result<()> {
        writeln!(
            writer,
            "{}{}{}{}{}",
            self.entity(),
            field_separator,
            self.timestamp(),
            field_separator,
            self.fields
        )
    }
}

impl Eq for LineRecord {}

impl PartialEq<Self> for LineRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl PartialOrd<Self> for LineRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LineRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}
