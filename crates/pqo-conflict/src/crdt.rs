//! Conflict-free replicated data types (spec §4.9). Each defines `create`,
//! its update operation(s), `value`, and a commutative, associative,
//! idempotent `merge`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grow-only counter: per-device nonnegative count, value = sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GCounter(BTreeMap<String, u64>);

impl GCounter {
    pub fn create() -> Self {
        Self(BTreeMap::new())
    }

    pub fn increment(&mut self, device: &str, by: u64) {
        *self.0.entry(device.to_string()).or_insert(0) += by;
    }

    pub fn value(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn merge(&self, other: &GCounter) -> GCounter {
        let mut out = self.0.clone();
        for (device, count) in &other.0 {
            let entry = out.entry(device.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        GCounter(out)
    }
}

/// Positive-negative counter: a pair of `GCounter`s, value = sum(p) − sum(n).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PnCounter {
    p: GCounter,
    n: GCounter,
}

impl PnCounter {
    pub fn create() -> Self {
        Self { p: GCounter::create(), n: GCounter::create() }
    }

    pub fn increment(&mut self, device: &str, by: u64) {
        self.p.increment(device, by);
    }

    pub fn decrement(&mut self, device: &str, by: u64) {
        self.n.increment(device, by);
    }

    pub fn value(&self) -> i64 {
        self.p.value() as i64 - self.n.value() as i64
    }

    pub fn merge(&self, other: &PnCounter) -> PnCounter {
        PnCounter { p: self.p.merge(&other.p), n: self.n.merge(&other.n) }
    }
}

/// Last-writer-wins register: `(value, timestamp)`. Ties break deterministically
/// by comparing the encoded value, so `merge` stays a pure function of its inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LwwRegister<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Clone + Ord> LwwRegister<T> {
    pub fn create(value: T, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }

    pub fn set(&mut self, value: T, timestamp: DateTime<Utc>) {
        if timestamp > self.timestamp || (timestamp == self.timestamp && value > self.value) {
            self.value = value;
            self.timestamp = timestamp;
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn merge(&self, other: &LwwRegister<T>) -> LwwRegister<T> {
        if self.timestamp > other.timestamp || (self.timestamp == other.timestamp && self.value >= other.value) {
            self.clone()
        } else {
            other.clone()
        }
    }
}

/// Map of key to `LwwRegister`: merge per key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LwwMap<T>(BTreeMap<String, LwwRegister<T>>);

impl<T: Clone + Ord> LwwMap<T> {
    pub fn create() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(&mut self, key: &str, value: T, timestamp: DateTime<Utc>) {
        match self.0.get_mut(key) {
            Some(register) => register.set(value, timestamp),
            None => {
                self.0.insert(key.to_string(), LwwRegister::create(value, timestamp));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.get(key).map(LwwRegister::value)
    }

    pub fn merge(&self, other: &LwwMap<T>) -> LwwMap<T> {
        let mut out = self.0.clone();
        for (key, reg) in &other.0 {
            match out.get(key) {
                Some(existing) => {
                    out.insert(key.clone(), existing.merge(reg));
                }
                None => {
                    out.insert(key.clone(), reg.clone());
                }
            }
        }
        LwwMap(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcounter_merge_takes_per_device_max() {
        let mut a = GCounter::create();
        a.increment("d1", 3);
        let mut b = GCounter::create();
        b.increment("d1", 2);
        b.increment("d2", 5);
        let merged = a.merge(&b);
        assert_eq!(merged.value(), 8);
    }

    #[test]
    fn gcounter_merge_is_idempotent() {
        let mut a = GCounter::create();
        a.increment("d1", 3);
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn pncounter_value_is_p_minus_n() {
        let mut c = PnCounter::create();
        c.increment("d1", 10);
        c.decrement("d1", 4);
        assert_eq!(c.value(), 6);
    }

    #[test]
    fn pncounter_merge_combines_both_sides() {
        let mut a = PnCounter::create();
        a.increment("d1", 10);
        let mut b = PnCounter::create();
        b.decrement("d1", 4);
        let merged = a.merge(&b);
        assert_eq!(merged.value(), 6);
    }

    #[test]
    fn lww_register_merge_keeps_later_timestamp() {
        let t0 = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let t1 = DateTime::parse_from_rfc3339("2026-01-01T00:00:01Z").unwrap().with_timezone(&Utc);
        let a = LwwRegister::create("old", t0);
        let b = LwwRegister::create("new", t1);
        assert_eq!(*a.merge(&b).value(), "new");
        assert_eq!(*b.merge(&a).value(), "new");
    }

    #[test]
    fn lww_register_tie_breaks_on_value() {
        let t = Utc::now();
        let a = LwwRegister::create(1, t);
        let b = LwwRegister::create(2, t);
        assert_eq!(*a.merge(&b).value(), 2);
    }

    #[test]
    fn lww_map_merges_per_key() {
        let t = Utc::now();
        let mut a = LwwMap::create();
        a.set("k1", "a1", t);
        let mut b = LwwMap::create();
        b.set("k2", "b2", t);
        let merged = a.merge(&b);
        assert_eq!(merged.get("k1"), Some(&"a1"));
        assert_eq!(merged.get("k2"), Some(&"b2"));
    }
}
