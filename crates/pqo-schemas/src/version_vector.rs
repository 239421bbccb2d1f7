//! Version vectors for optimistic causal-conflict detection (spec §4.9).

use std::collections::BTreeMap;

/// A map from device/replica identifier to a monotonic counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VersionVector(pub BTreeMap<String, u64>);

/// Result of comparing two version vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorOrdering {
    Equal,
    Greater,
    Less,
    Concurrent,
}

impl VersionVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, device: &str) -> u64 {
        *self.0.get(device).unwrap_or(&0)
    }

    pub fn increment(&mut self, device: &str) {
        *self.0.entry(device.to_string()).or_insert(0) += 1;
    }

    /// Component-wise max of `self` and `other`.
    pub fn merged_max(&self, other: &VersionVector) -> VersionVector {
        let mut out = self.clone();
        for (device, count) in &other.0 {
            let entry = out.0.entry(device.clone()).or_insert(0);
            if *count > *entry {
                *entry = *count;
            }
        }
        out
    }

    /// Compare two version vectors per spec §4.9: component-wise max-pair
    /// logic, where both-greater-in-different-components is Concurrent.
    pub fn compare(&self, other: &VersionVector) -> VectorOrdering {
        let mut devices: std::collections::BTreeSet<&String> = self.0.keys().collect();
        devices.extend(other.0.keys());

        let mut self_greater_somewhere = false;
        let mut other_greater_somewhere = false;

        for device in devices {
            let a = self.get(device);
            let b = other.get(device);
            if a > b {
                self_greater_somewhere = true;
            } else if b > a {
                other_greater_somewhere = true;
            }
        }

        match (self_greater_somewhere, other_greater_somewhere) {
            (false, false) => VectorOrdering::Equal,
            (true, false) => VectorOrdering::Greater,
            (false, true) => VectorOrdering::Less,
            (true, true) => VectorOrdering::Concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vv(pairs: &[(&str, u64)]) -> VersionVector {
        VersionVector(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn missing_component_treated_as_zero() {
        // {a:1} vs {a:1,b:0}: Equal — boundary behavior from spec §8.
        let a = vv(&[("a", 1)]);
        let b = vv(&[("a", 1), ("b", 0)]);
        assert_eq!(a.compare(&b), VectorOrdering::Equal);
    }

    #[test]
    fn strictly_dominating_is_greater() {
        let a = vv(&[("a", 2), ("b", 1)]);
        let b = vv(&[("a", 1), ("b", 1)]);
        assert_eq!(a.compare(&b), VectorOrdering::Greater);
        assert_eq!(b.compare(&a), VectorOrdering::Less);
    }

    #[test]
    fn divergent_components_are_concurrent() {
        let a = vv(&[("a", 2), ("b", 1)]);
        let b = vv(&[("a", 1), ("b", 2)]);
        assert_eq!(a.compare(&b), VectorOrdering::Concurrent);
    }

    #[test]
    fn merged_max_is_componentwise() {
        let a = vv(&[("a", 2), ("b", 1)]);
        let b = vv(&[("a", 1), ("b", 3), ("c", 1)]);
        let merged = a.merged_max(&b);
        assert_eq!(merged.get("a"), 2);
        assert_eq!(merged.get("b"), 3);
        assert_eq!(merged.get("c"), 1);
    }
}
