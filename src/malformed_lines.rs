/// What a record source does with a data line that lacks the required fields
///
/// A file whose first data line is malformed is skipped entirely under either policy.
///
/// # Examples
/// ```
/// use market_data_merge::malformed_lines::MalformedLines;
/// use market_data_merge::merge::Merge;
///
/// let mut merge = Merge::new("input".into(), "work".into(), "merged.txt".into());
/// // stop reading a file at its first malformed line
/// merge.with_malformed_lines(MalformedLines::EndSource);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MalformedLines {
    /// Drop the line with a warning and continue with the next line of the same file
    #[default]
    Skip,
    /// Drop the line and everything after it in the same file
    EndSource,
}
