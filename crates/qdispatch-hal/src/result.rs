//! Measurement outcome counts.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Outcome label (bitstring) to number of occurrences.
///
/// Ordered by label so serialized payloads are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add occurrences of an outcome, accumulating with any existing value.
    pub fn insert(&mut self, label: impl Into<String>, count: u64) {
        *self.0.entry(label.into()).or_insert(0) += count;
    }

    /// Occurrences of an outcome (0 if never seen).
    pub fn get(&self, label: &str) -> u64 {
        self.0.get(label).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total_shots(&self) -> u64 {
        self.0.values().sum()
    }

    /// The most frequent outcome, ties broken by label order.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.0
            .iter()
            .fold(None, |best: Option<(&str, u64)>, (label, &count)| match best {
                Some((_, c)) if c >= count => best,
                _ => Some((label.as_str(), count)),
            })
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no outcomes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over outcomes in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl From<HashMap<String, u64>> for Counts {
    fn from(map: HashMap<String, u64>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (label, count) in iter {
            counts.insert(label, count);
        }
        counts
    }
}
