//! In-memory comparison cache with a fixed maximum age.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::ComparisonResult;

pub struct ComparisonCache {
    entries: HashMap<String, (DateTime<Utc>, ComparisonResult)>,
    max_age: Duration,
}

impl ComparisonCache {
    pub fn new(max_age: Duration) -> Self {
        Self { entries: HashMap::new(), max_age }
    }

    /// Order-independent key: ids sorted and joined with `_`.
    pub fn key<S: AsRef<str>>(ids: &[S]) -> String {
        let mut ids: Vec<&str> = ids.iter().map(|s| s.as_ref()).collect();
        ids.sort_unstable();
        ids.join("_")
    }

    fn is_fresh(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created < self.max_age
    }

    /// A fresh entry, or `None`. A stale entry for this key is removed.
    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<ComparisonResult> {
        let (created, result) = self.entries.get(key)?;
        if self.is_fresh(*created, now) {
            return Some(result.clone());
        }
        self.entries.remove(key);
        None
    }

    /// Insert and drop every stale entry.
    pub fn insert(&mut self, key: String, result: ComparisonResult, now: DateTime<Utc>) {
        let max_age = self.max_age;
        self.entries.retain(|_, (created, _)| now - *created < max_age);
        self.entries.insert(key, (now, result));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
