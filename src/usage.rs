use serde::Serialize;
use serde::ser::SerializeMap;
use std::collections::BTreeMap;

use crate::namespace::{self, LEGACY_FAMILY, Namespace, RENAMED_FAMILY};

/// Reference counts per tracked namespace.
///
/// Namespaces never seen are absent rather than zero, so two usages with
/// the same non-zero counts always compare equal. Iteration follows the
/// namespace declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    counts: BTreeMap<Namespace, u64>,
}

impl Usage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a usage by classifying every reference.
    pub fn from_references<'a, I>(references: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut usage = Usage::new();
        for reference in references {
            usage.record(reference);
        }
        usage
    }

    /// Classifies `reference` and counts it if a namespace claims it.
    pub fn record(&mut self, reference: &str) -> Option<Namespace> {
        let ns = namespace::classify(reference)?;
        self.add(ns, 1);
        Some(ns)
    }

    pub fn add(&mut self, ns: Namespace, count: u64) {
        if count > 0 {
            *self.counts.entry(ns).or_insert(0) += count;
        }
    }

    pub fn get(&self, ns: Namespace) -> u64 {
        self.counts.get(&ns).copied().unwrap_or(0)
    }

    /// Element-wise sum; neither input is modified.
    pub fn merge(&self, other: &Usage) -> Usage {
        let mut merged = self.clone();
        for (ns, count) in &other.counts {
            merged.add(*ns, *count);
        }
        merged
    }

    pub fn total_for_family(&self, prefix: &str) -> u64 {
        self.counts
            .iter()
            .filter(|(ns, _)| ns.name().starts_with(prefix))
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn javax(&self) -> u64 {
        self.total_for_family(LEGACY_FAMILY)
    }

    pub fn jakarta(&self) -> u64 {
        self.total_for_family(RENAMED_FAMILY)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Every namespace with its count, zeros included, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Namespace, u64)> + '_ {
        Namespace::ALL.iter().map(|ns| (*ns, self.get(*ns)))
    }
}

impl Serialize for Usage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len() + 2))?;
        map.serialize_entry("javax", &self.javax())?;
        map.serialize_entry("jakarta", &self.jakarta())?;
        for (ns, count) in &self.counts {
            map.serialize_entry(ns.name(), count)?;
        }
        map.end()
    }
}
