// SPDX-License-Identifier: MIT OR Apache-2.0

//! An ordered, case-preserving multi-valued string map, used for both
//! headers and query parameters.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl MultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.entries.get(key)?.first().map(|s| s.as_str())
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_accumulates_multiple_values() {
        let mut m = MultiMap::new();
        m.insert("tags", "a");
        m.insert("tags", "b");
        assert_eq!(m.get_all("tags"), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn set_replaces_existing_values() {
        let mut m = MultiMap::new();
        m.insert("x", "a");
        m.set("x", "b");
        assert_eq!(m.get_all("x"), &["b".to_string()]);
    }
}
