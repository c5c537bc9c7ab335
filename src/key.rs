use std::cmp::Ordering;

/// Ordering key of a record: timestamp first, entity on ties.
///
/// Timestamps are compared as plain strings. Inputs are expected to use a fixed width, zero
/// padded format such as `2021-03-05 10:00:00.123` so that string order is time order.
#[derive(Clone, Debug)]
pub(crate) struct Key {
    timestamp: String,
    entity: String,
}

impl Key {
    pub(crate) fn new(timestamp: String, entity: String) -> Key {
        Key {
            timestamp,
            entity,
        }
    }

    pub(crate) fn timestamp(&self) -> &str {
        self.timestamp.as_str()
    }

    pub(crate) fn entity(&self) -> &str {
        self.entity.as_str()
    }
}

impl Eq for Key {}

impl PartialEq<Self> for Key {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.entity == other.entity
    }
}

impl PartialOrd<Self> for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.entity.cmp(&other.entity))
    }
}
