use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::line_record::LineRecord;
use crate::record_source::RecordSource;

/// The next unconsumed record of one source. Owned by the merge that pulled it.
#[derive(Debug)]
struct HeapEntry {
    line_record: LineRecord,
    source: usize,
}

impl Eq for HeapEntry {}

impl PartialEq<Self> for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.line_record == other.line_record && self.source == other.source
    }
}

impl PartialOrd<Self> for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line_record
            .cmp(&other.line_record)
            .then_with(|| self.source.cmp(&other.source))
    }
}

/// k-way merge of record sources that are each ordered by (timestamp, entity).
///
/// Yields every record of every source exactly once, in non decreasing key order, keeping the
/// relative order of records coming from the same source. Each step costs O(log k) for k
/// sources still holding records.
pub(crate) struct OrderedMerge {
    sources: Vec<RecordSource>,
    // BinaryHeap is a max heap
    heap: BinaryHeap<Reverse<HeapEntry>>,
    // sources that yielded nothing when the heap was seeded
    empty: Vec<usize>,
    emitted: usize,
}

impl OrderedMerge {
    pub(crate) fn new(mut sources: Vec<RecordSource>) -> OrderedMerge {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        let mut empty = Vec::new();
        for (source, record_source) in sources.iter_mut().enumerate() {
            match record_source.next() {
                Some(line_record) => heap.push(Reverse(HeapEntry { line_record, source })),
                None => empty.push(source),
            }
        }

        OrderedMerge {
            sources,
            heap,
            empty,
            emitted: 0,
        }
    }

    pub(crate) fn sources(&self) -> &[RecordSource] {
        &self.sources
    }

    /// Sources that held no records at all
    pub(crate) fn empty_sources(&self) -> impl Iterator<Item = &RecordSource> + '_ {
        self.empty.iter().map(move |source| &self.sources[*source])
    }

    /// Header of the first source that has one
    pub(crate) fn header(&self) -> Option<&String> {
        self.sources().iter().find_map(|source| source.header())
    }

    pub(crate) fn emitted(&self) -> usize {
        self.emitted
    }

    pub(crate) fn dropped(&self) -> usize {
        self.sources().iter().map(|source| source.dropped()).sum()
    }
}

impl Iterator for OrderedMerge {
    type Item = LineRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(Reverse(HeapEntry { line_record, source })) = self.heap.pop() else {
            // the heap only empties once every source is drained
            debug_assert!(self.sources.iter().all(|source| source.is_exhausted()));
            return None;
        };
        if let Some(next) = self.sources[source].next() {
            self.heap.push(Reverse(HeapEntry { line_record: next, source }));
        }
        self.emitted += 1;
        Some(line_record)
    }
}
