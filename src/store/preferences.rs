//! Per-user search preferences, one JSON file per user.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{StoreError, ensure_dir, format_timestamp, lock, read_json, write_json};

/// Selectable result counts.
pub const MAX_RESULT_CHOICES: [u32; 3] = [5, 10, 20];

/// arXiv categories offered in settings, grouped by field.
pub const CATEGORY_FIELDS: &[(&str, &[(&str, &str)])] = &[
    (
        "Computer Science",
        &[
            ("cs.AI", "Artificial Intelligence"),
            ("cs.CL", "Computation and Language"),
            ("cs.CV", "Computer Vision and Pattern Recognition"),
            ("cs.LG", "Machine Learning"),
            ("cs.NE", "Neural and Evolutionary Computing"),
            ("cs.RO", "Robotics"),
            ("cs.SE", "Software Engineering"),
        ],
    ),
    (
        "Physics",
        &[
            ("physics.app-ph", "Applied Physics"),
            ("physics.data-an", "Data Analysis, Statistics and Probability"),
            ("physics.comp-ph", "Computational Physics"),
        ],
    ),
    (
        "Mathematics",
        &[
            ("math.NA", "Numerical Analysis"),
            ("math.ST", "Statistics Theory"),
            ("math.PR", "Probability"),
        ],
    ),
    (
        "Statistics",
        &[
            ("stat.ML", "Machine Learning"),
            ("stat.TH", "Statistics Theory"),
            ("stat.AP", "Applications"),
        ],
    ),
    (
        "Quantitative Biology",
        &[
            ("q-bio.BM", "Biomolecules"),
            ("q-bio.NC", "Neurons and Cognition"),
            ("q-bio.QM", "Quantitative Methods"),
        ],
    ),
];

pub fn is_known_category(code: &str) -> bool {
    CATEGORY_FIELDS
        .iter()
        .any(|(_, cats)| cats.iter().any(|(c, _)| *c == code))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub specific_journals: Vec<String>,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    #[serde(default)]
    pub auto_download: bool,
    #[serde(default)]
    pub last_updated: String,
}

fn default_max_results() -> u32 {
    10
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            specific_journals: Vec::new(),
            preferred_categories: Vec::new(),
            auto_download: false,
            last_updated: format_timestamp(Utc::now()),
        }
    }
}

impl Preferences {
    /// Add a journal name. Returns false when empty or already present (case-insensitive).
    pub fn add_journal(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty()
            || self.specific_journals.iter().any(|j| j.eq_ignore_ascii_case(name))
        {
            return false;
        }
        self.specific_journals.push(name.to_string());
        true
    }

    pub fn remove_journal(&mut self, index: usize) -> Option<String> {
        (index < self.specific_journals.len()).then(|| self.specific_journals.remove(index))
    }

    /// Toggle a category, returning whether it is now selected.
    pub fn toggle_category(&mut self, code: &str) -> bool {
        if let Some(pos) = self.preferred_categories.iter().position(|c| c == code) {
            self.preferred_categories.remove(pos);
            false
        } else {
            self.preferred_categories.push(code.to_string());
            true
        }
    }
}

pub struct PreferenceStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        let dir = data_dir.join("user_preferences");
        ensure_dir(&dir)?;
        Ok(Self { dir, lock: Mutex::new(()) })
    }

    fn path(&self, user_id: i64) -> PathBuf {
        self.dir.join(format!("user_{user_id}.json"))
    }

    /// Load a user's preferences, creating the default file when missing or unreadable.
    pub fn get(&self, user_id: i64) -> Result<Preferences, StoreError> {
        let _guard = lock(&self.lock);
        self.load(user_id)
    }

    fn load(&self, user_id: i64) -> Result<Preferences, StoreError> {
        match read_json(&self.path(user_id)) {
            Ok(Some(prefs)) => Ok(prefs),
            Ok(None) => {
                let prefs = Preferences::default();
                write_json(&self.path(user_id), &prefs)?;
                Ok(prefs)
            }
            Err(StoreError::Json { path, source }) => {
                warn!("Resetting unreadable preferences {}: {source}", path.display());
                let prefs = Preferences::default();
                write_json(&self.path(user_id), &prefs)?;
                Ok(prefs)
            }
            Err(e) => Err(e),
        }
    }

    /// Save the whole record, stamping `last_updated`.
    pub fn save(&self, user_id: i64, prefs: &Preferences) -> Result<(), StoreError> {
        let _guard = lock(&self.lock);
        self.store(user_id, prefs.clone())
    }

    fn store(&self, user_id: i64, mut prefs: Preferences) -> Result<(), StoreError> {
        prefs.last_updated = format_timestamp(Utc::now());
        write_json(&self.path(user_id), &prefs)
    }

    /// Read-modify-write one record.
    pub fn update<R>(&self, user_id: i64, f: impl FnOnce(&mut Preferences) -> R) -> Result<(R, Preferences), StoreError> {
        let _guard = lock(&self.lock);
        let mut prefs = self.load(user_id)?;
        let out = f(&mut prefs);
        self.store(user_id, prefs.clone())?;
        Ok((out, prefs))
    }

    pub fn reset(&self, user_id: i64) -> Result<Preferences, StoreError> {
        let _guard = lock(&self.lock);
        let prefs = Preferences::default();
        self.store(user_id, prefs.clone())?;
        Ok(prefs)
    }

    pub fn set_max_results(&self, user_id: i64, n: u32) -> Result<(), StoreError> {
        if !MAX_RESULT_CHOICES.contains(&n) {
            return Err(StoreError::Invalid(format!("max results must be one of {MAX_RESULT_CHOICES:?}")));
        }
        self.update(user_id, |p| p.max_results = n).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, PreferenceStore) {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_default_created_on_first_get() {
        let (dir, store) = store();
        let prefs = store.get(42).unwrap();
        assert_eq!(prefs.max_results, 10);
        assert!(prefs.specific_journals.is_empty());
        assert!(!prefs.auto_download);
        assert!(dir.path().join("user_preferences/user_42.json").exists());
    }

    #[test]
    fn test_corrupt_file_resets_to_default() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("user_preferences/user_7.json"), "not json").unwrap();
        let prefs = store.get(7).unwrap();
        assert_eq!(prefs.max_results, 10);
    }

    #[test]
    fn test_update_persists() {
        let (_dir, store) = store();
        let (added, _) = store.update(1, |p| p.add_journal("Nature")).unwrap();
        assert!(added);
        let (dup, _) = store.update(1, |p| p.add_journal("nature")).unwrap();
        assert!(!dup);
        store.update(1, |p| p.toggle_category("cs.AI")).unwrap();
        store.set_max_results(1, 20).unwrap();

        let prefs = store.get(1).unwrap();
        assert_eq!(prefs.specific_journals, vec!["Nature"]);
        assert_eq!(prefs.preferred_categories, vec!["cs.AI"]);
        assert_eq!(prefs.max_results, 20);
    }

    #[test]
    fn test_invalid_max_results() {
        let (_dir, store) = store();
        assert!(matches!(store.set_max_results(1, 7), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_reset() {
        let (_dir, store) = store();
        store.update(3, |p| p.auto_download = true).unwrap();
        let prefs = store.reset(3).unwrap();
        assert!(!prefs.auto_download);
        assert!(!store.get(3).unwrap().auto_download);
    }

    #[test]
    fn test_remove_journal_by_index() {
        let mut prefs = Preferences::default();
        prefs.add_journal("A");
        prefs.add_journal("B");
        assert_eq!(prefs.remove_journal(0).as_deref(), Some("A"));
        assert_eq!(prefs.remove_journal(5), None);
        assert_eq!(prefs.specific_journals, vec!["B"]);
    }

    #[test]
    fn test_catalog() {
        assert!(is_known_category("q-bio.NC"));
        assert!(!is_known_category("cs.XX"));
    }
}
