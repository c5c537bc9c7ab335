/// Field layout of the lines read by a record source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LineLayout {
    /// An entity file: one header line, then `timestamp,fields...`
    Raw,
    /// An intermediate file: no header, `entity,timestamp,fields...`
    Labeled,
}

impl LineLayout {
    pub(crate) fn has_header(&self) -> bool {
        matches!(self, LineLayout::Raw)
    }
}
