//! Per-user notification settings, one JSON file per user.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{StoreError, ensure_dir, format_timestamp, lock, parse_timestamp, read_json, write_json};

const FILE_PREFIX: &str = "notifications_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    pub fn interval(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::days(7),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub last_notification: Option<String>,
    /// `HH:MM`, UTC.
    #[serde(default = "default_notification_time")]
    pub notification_time: String,
    #[serde(default)]
    pub last_checked: String,
}

fn default_notification_time() -> String {
    "09:00".to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Frequency::Daily,
            keywords: Vec::new(),
            categories: Vec::new(),
            last_notification: None,
            notification_time: default_notification_time(),
            last_checked: format_timestamp(Utc::now()),
        }
    }
}

impl NotificationSettings {
    /// Add a keyword (lower-cased). Returns false for blanks and duplicates.
    pub fn add_keyword(&mut self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() || self.keywords.contains(&keyword) {
            return false;
        }
        self.keywords.push(keyword);
        true
    }

    pub fn remove_keyword(&mut self, index: usize) -> Option<String> {
        (index < self.keywords.len()).then(|| self.keywords.remove(index))
    }

    pub fn toggle_category(&mut self, code: &str) -> bool {
        if let Some(pos) = self.categories.iter().position(|c| c == code) {
            self.categories.remove(pos);
            false
        } else {
            self.categories.push(code.to_string());
            true
        }
    }

    /// Whether a digest is due at `now`.
    ///
    /// Disabled users never are. Users never notified always are. Otherwise
    /// `now` must be at or past [`next_due`](Self::next_due).
    pub fn should_notify(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.next_due() {
            Some(due) => now >= due,
            None => true,
        }
    }

    /// `notification_time` on the day one frequency interval after the last
    /// digest. `None` when no digest was sent yet.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        let last = self.last_notification.as_deref().and_then(parse_timestamp)?;
        let earliest = last + self.frequency.interval();
        Some(match parse_time_of_day(&self.notification_time) {
            Some(at) => earliest.date_naive().and_time(at).and_utc(),
            None => earliest,
        })
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.last_checked)
    }

    /// Record a completed scan.
    pub fn mark_checked(&mut self, now: DateTime<Utc>) {
        let stamp = format_timestamp(now);
        self.last_checked = stamp.clone();
        self.last_notification = Some(stamp);
    }
}

/// Parse `HH:MM` (24h).
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

pub struct NotificationStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl NotificationStore {
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        let dir = data_dir.join("user_notifications");
        ensure_dir(&dir)?;
        Ok(Self { dir, lock: Mutex::new(()) })
    }

    fn path(&self, user_id: i64) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{user_id}.json"))
    }

    pub fn get(&self, user_id: i64) -> Result<NotificationSettings, StoreError> {
        let _guard = lock(&self.lock);
        self.load(user_id)
    }

    fn load(&self, user_id: i64) -> Result<NotificationSettings, StoreError> {
        match read_json(&self.path(user_id)) {
            Ok(Some(settings)) => Ok(settings),
            Ok(None) => {
                let settings = NotificationSettings::default();
                write_json(&self.path(user_id), &settings)?;
                Ok(settings)
            }
            Err(StoreError::Json { path, source }) => {
                warn!("Resetting unreadable notification settings {}: {source}", path.display());
                let settings = NotificationSettings::default();
                write_json(&self.path(user_id), &settings)?;
                Ok(settings)
            }
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, user_id: i64, settings: &NotificationSettings) -> Result<(), StoreError> {
        let _guard = lock(&self.lock);
        write_json(&self.path(user_id), settings)
    }

    pub fn update<R>(
        &self,
        user_id: i64,
        f: impl FnOnce(&mut NotificationSettings) -> R,
    ) -> Result<(R, NotificationSettings), StoreError> {
        let _guard = lock(&self.lock);
        let mut settings = self.load(user_id)?;
        let out = f(&mut settings);
        write_json(&self.path(user_id), &settings)?;
        Ok((out, settings))
    }

    pub fn set_time(&self, user_id: i64, time: &str) -> Result<String, StoreError> {
        let parsed = parse_time_of_day(time)
            .ok_or_else(|| StoreError::Invalid(format!("'{}' is not a valid HH:MM time", time.trim())))?;
        let formatted = parsed.format("%H:%M").to_string();
        self.update(user_id, |s| s.notification_time = formatted.clone())?;
        Ok(formatted)
    }

    pub fn should_notify(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.get(user_id)?.should_notify(now))
    }

    /// Every user with a settings file, in ascending id order.
    pub fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| StoreError::Io { path: self.dir.clone(), source: e })?;
        let mut ids: Vec<i64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_prefix(FILE_PREFIX)?.strip_suffix(".json")?.parse().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn enabled() -> NotificationSettings {
        NotificationSettings { enabled: true, ..Default::default() }
    }

    #[test]
    fn test_disabled_never_notifies() {
        let settings = NotificationSettings::default();
        assert!(!settings.should_notify(at(2024, 1, 1, 12, 0)));
    }

    #[test]
    fn test_first_notification_is_due() {
        assert!(enabled().should_notify(at(2024, 1, 1, 3, 0)));
    }

    #[test]
    fn test_daily_interval_and_time_of_day() {
        let mut settings = enabled();
        settings.mark_checked(at(2024, 1, 1, 9, 0));
        // Less than a day later
        assert!(!settings.should_notify(at(2024, 1, 2, 8, 59)));
        // A day later, at the configured time
        assert!(settings.should_notify(at(2024, 1, 2, 9, 0)));

        settings.notification_time = "18:30".to_string();
        assert!(!settings.should_notify(at(2024, 1, 2, 12, 0)));
        assert!(settings.should_notify(at(2024, 1, 2, 18, 30)));
    }

    #[test]
    fn test_late_scan_does_not_shift_schedule() {
        let mut settings = enabled();
        // Scheduled for 09:00 but the scan ran late
        settings.mark_checked(at(2024, 1, 1, 10, 30));
        assert_eq!(settings.next_due(), Some(at(2024, 1, 2, 9, 0)));
        assert!(!settings.should_notify(at(2024, 1, 2, 8, 59)));
        assert!(settings.should_notify(at(2024, 1, 2, 9, 0)));

        settings.mark_checked(at(2024, 1, 2, 9, 0));
        assert_eq!(settings.next_due(), Some(at(2024, 1, 3, 9, 0)));
    }

    #[test]
    fn test_weekly_interval() {
        let mut settings = enabled();
        settings.frequency = Frequency::Weekly;
        settings.notification_time = "00:00".to_string();
        settings.mark_checked(at(2024, 1, 1, 0, 0));
        assert!(!settings.should_notify(at(2024, 1, 7, 23, 59)));
        assert!(settings.should_notify(at(2024, 1, 8, 0, 0)));
    }

    #[test]
    fn test_keywords_dedupe() {
        let mut settings = NotificationSettings::default();
        assert!(settings.add_keyword("  LLM "));
        assert!(!settings.add_keyword("llm"));
        assert!(!settings.add_keyword("   "));
        assert_eq!(settings.keywords, vec!["llm"]);
        assert_eq!(settings.remove_keyword(0).as_deref(), Some("llm"));
        assert_eq!(settings.remove_keyword(0), None);
    }

    #[test]
    fn test_frequency_serializes_lowercase() {
        let json = serde_json::to_value(Frequency::Weekly).unwrap();
        assert_eq!(json, "weekly");
    }

    #[test]
    fn test_store_round_trip_and_listing() {
        let dir = TempDir::new().unwrap();
        let store = NotificationStore::new(dir.path()).unwrap();
        store.update(20, |s| s.enabled = true).unwrap();
        store.update(3, |s| s.add_keyword("graphs")).unwrap();
        std::fs::write(dir.path().join("user_notifications/notifications_bad.json"), "{}").unwrap();
        std::fs::write(dir.path().join("user_notifications/other.json"), "{}").unwrap();

        assert_eq!(store.user_ids().unwrap(), vec![3, 20]);
        assert!(store.get(20).unwrap().enabled);
        assert_eq!(store.get(3).unwrap().keywords, vec!["graphs"]);
    }

    #[test]
    fn test_set_time_validates() {
        let dir = TempDir::new().unwrap();
        let store = NotificationStore::new(dir.path()).unwrap();
        assert_eq!(store.set_time(1, " 7:05 ").unwrap(), "07:05");
        assert!(matches!(store.set_time(1, "25:00"), Err(StoreError::Invalid(_))));
        assert_eq!(store.get(1).unwrap().notification_time, "07:05");
    }
}
