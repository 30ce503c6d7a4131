//! Shared admin data: admin list, usage statistics, user registry and restrictions.
//!
//! Four JSON files under `<data_dir>/bot_data/`. Each mutation is a whole-file
//! read-modify-write under one process-wide lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{StoreError, ensure_dir, format_timestamp, lock, parse_timestamp, read_json, write_json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminList {
    pub admins: Vec<i64>,
    pub owner: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_searches: u64,
    #[serde(default)]
    pub total_downloads: u64,
    #[serde(default)]
    pub total_summaries: u64,
    #[serde(default)]
    pub active_users_today: u64,
    #[serde(default)]
    pub last_reset: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionCounts {
    #[serde(default)]
    pub searches: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub summaries: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: Option<String>,
    pub first_seen: String,
    pub last_active: String,
    #[serde(default)]
    pub total_actions: u64,
    #[serde(default)]
    pub actions: ActionCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    pub end_time: String,
    pub restricted_by: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Restrictions {
    #[serde(default)]
    pub blocked: Vec<i64>,
    #[serde(default)]
    pub restricted: BTreeMap<i64, Restriction>,
}

/// Counted user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Search,
    Download,
    Summary,
}

/// One row of the restrictions panel.
#[derive(Debug, Clone, PartialEq)]
pub enum RestrictionEntry {
    Blocked(i64),
    Timed { user_id: i64, restriction: Restriction },
}

pub struct AdminStore {
    dir: PathBuf,
    owner: i64,
    lock: Mutex<()>,
}

impl AdminStore {
    /// Open the store, creating missing files and making sure `owner` is an admin.
    pub fn new(data_dir: &Path, owner: i64) -> Result<Self, StoreError> {
        let dir = data_dir.join("bot_data");
        ensure_dir(&dir)?;
        let store = Self { dir, owner, lock: Mutex::new(()) };

        {
            let _guard = lock(&store.lock);
            let mut admins: AdminList = store
                .load_or("admins.json", || AdminList { admins: vec![owner], owner })?;
            admins.owner = owner;
            if !admins.admins.contains(&owner) {
                admins.admins.insert(0, owner);
            }
            store.write("admins.json", &admins)?;

            let stats: Statistics = store.load_or("statistics.json", || Statistics {
                last_reset: format_timestamp(Utc::now()),
                ..Default::default()
            })?;
            store.write("statistics.json", &stats)?;
            let users: BTreeMap<i64, UserRecord> = store.load_or("users.json", BTreeMap::new)?;
            store.write("users.json", &users)?;
            let restrictions: Restrictions = store.load_or("restrictions.json", Restrictions::default)?;
            store.write("restrictions.json", &restrictions)?;
        }

        Ok(store)
    }

    /// Missing and unreadable files both yield `default()`.
    fn load_or<T: DeserializeOwned>(&self, name: &str, default: impl FnOnce() -> T) -> Result<T, StoreError> {
        match read_json(&self.dir.join(name)) {
            Ok(value) => Ok(value.unwrap_or_else(default)),
            Err(StoreError::Json { path, source }) => {
                warn!("Ignoring unreadable {}: {source}", path.display());
                Ok(default())
            }
            Err(e) => Err(e),
        }
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        write_json(&self.dir.join(name), value)
    }

    pub fn owner(&self) -> i64 {
        self.owner
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        user_id == self.owner
    }

    pub fn admins(&self) -> Result<Vec<i64>, StoreError> {
        let _guard = lock(&self.lock);
        Ok(self.load_or("admins.json", || AdminList { admins: vec![self.owner], owner: self.owner })?.admins)
    }

    pub fn is_admin(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.is_owner(user_id) || self.admins()?.contains(&user_id))
    }

    /// Returns false when the user already is an admin.
    pub fn add_admin(&self, user_id: i64) -> Result<bool, StoreError> {
        let _guard = lock(&self.lock);
        let mut list: AdminList =
            self.load_or("admins.json", || AdminList { admins: vec![self.owner], owner: self.owner })?;
        if list.admins.contains(&user_id) {
            return Ok(false);
        }
        list.admins.push(user_id);
        self.write("admins.json", &list)?;
        Ok(true)
    }

    /// Returns false when the user is not an admin or is the owner.
    pub fn remove_admin(&self, user_id: i64) -> Result<bool, StoreError> {
        if self.is_owner(user_id) {
            return Ok(false);
        }
        let _guard = lock(&self.lock);
        let mut list: AdminList =
            self.load_or("admins.json", || AdminList { admins: vec![self.owner], owner: self.owner })?;
        let before = list.admins.len();
        list.admins.retain(|&id| id != user_id);
        if list.admins.len() == before {
            return Ok(false);
        }
        self.write("admins.json", &list)?;
        Ok(true)
    }

    /// Register activity for a user, bumping global and per-user counters for `kind`.
    pub fn record_activity(
        &self,
        user_id: i64,
        username: Option<&str>,
        kind: Option<ActionKind>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _guard = lock(&self.lock);
        let mut stats: Statistics = self.load_or("statistics.json", Statistics::default)?;
        let mut users: BTreeMap<i64, UserRecord> = self.load_or("users.json", BTreeMap::new)?;
        let stamp = format_timestamp(now);

        let record = users.entry(user_id).or_insert_with(|| {
            stats.total_users += 1;
            UserRecord {
                username: None,
                first_seen: stamp.clone(),
                last_active: stamp.clone(),
                total_actions: 0,
                actions: ActionCounts::default(),
            }
        });
        record.last_active = stamp;
        if let Some(name) = username {
            record.username = Some(name.to_string());
        }

        if let Some(kind) = kind {
            record.total_actions += 1;
            match kind {
                ActionKind::Search => {
                    record.actions.searches += 1;
                    stats.total_searches += 1;
                }
                ActionKind::Download => {
                    record.actions.downloads += 1;
                    stats.total_downloads += 1;
                }
                ActionKind::Summary => {
                    record.actions.summaries += 1;
                    stats.total_summaries += 1;
                }
            }
        }

        stats.active_users_today = count_active_on(&users, now);
        self.write("users.json", &users)?;
        self.write("statistics.json", &stats)
    }

    /// Current statistics with `active_users_today` recomputed for `now`.
    pub fn statistics(&self, now: DateTime<Utc>) -> Result<Statistics, StoreError> {
        let _guard = lock(&self.lock);
        let mut stats: Statistics = self.load_or("statistics.json", Statistics::default)?;
        let users: BTreeMap<i64, UserRecord> = self.load_or("users.json", BTreeMap::new)?;
        stats.active_users_today = count_active_on(&users, now);
        Ok(stats)
    }

    /// One page of the user registry, most recently active first, plus the page count.
    pub fn users_page(&self, page: usize, per_page: usize) -> Result<(Vec<(i64, UserRecord)>, usize), StoreError> {
        let _guard = lock(&self.lock);
        let users: BTreeMap<i64, UserRecord> = self.load_or("users.json", BTreeMap::new)?;
        let mut list: Vec<(i64, UserRecord)> = users.into_iter().collect();
        list.sort_by(|a, b| b.1.last_active.cmp(&a.1.last_active).then(a.0.cmp(&b.0)));
        Ok(paginate(list, page, per_page))
    }

    pub fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        let _guard = lock(&self.lock);
        let users: BTreeMap<i64, UserRecord> = self.load_or("users.json", BTreeMap::new)?;
        Ok(users.into_keys().collect())
    }

    /// Users whose last activity is within `hours` of `now`.
    pub fn active_since(&self, now: DateTime<Utc>, hours: i64) -> Result<Vec<i64>, StoreError> {
        let _guard = lock(&self.lock);
        let users: BTreeMap<i64, UserRecord> = self.load_or("users.json", BTreeMap::new)?;
        let cutoff = now - Duration::hours(hours);
        Ok(users
            .into_iter()
            .filter(|(_, u)| parse_timestamp(&u.last_active).is_some_and(|t| t >= cutoff))
            .map(|(id, _)| id)
            .collect())
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<i64>, StoreError> {
        let wanted = username.trim().trim_start_matches('@');
        let _guard = lock(&self.lock);
        let users: BTreeMap<i64, UserRecord> = self.load_or("users.json", BTreeMap::new)?;
        Ok(users
            .into_iter()
            .find(|(_, u)| u.username.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(wanted)))
            .map(|(id, _)| id))
    }

    /// Resolve a numeric id or `@username` from the registry.
    pub fn resolve_user(&self, token: &str) -> Result<Option<i64>, StoreError> {
        let token = token.trim();
        if token.starts_with('@') {
            return self.find_user_by_username(token);
        }
        Ok(token.parse().ok())
    }

    pub fn restrict(
        &self,
        user_id: i64,
        until: DateTime<Utc>,
        by: i64,
        reason: &str,
    ) -> Result<(), StoreError> {
        let _guard = lock(&self.lock);
        let mut r: Restrictions = self.load_or("restrictions.json", Restrictions::default)?;
        let reason = if reason.trim().is_empty() { "No reason provided" } else { reason.trim() };
        r.restricted.insert(
            user_id,
            Restriction { end_time: format_timestamp(until), restricted_by: by, reason: reason.to_string() },
        );
        self.write("restrictions.json", &r)
    }

    /// Returns false when the user was already blocked.
    pub fn block(&self, user_id: i64) -> Result<bool, StoreError> {
        let _guard = lock(&self.lock);
        let mut r: Restrictions = self.load_or("restrictions.json", Restrictions::default)?;
        if r.blocked.contains(&user_id) {
            return Ok(false);
        }
        r.blocked.push(user_id);
        self.write("restrictions.json", &r)?;
        Ok(true)
    }

    /// Lift both a block and a timed restriction. Returns whether anything was removed.
    pub fn unrestrict(&self, user_id: i64) -> Result<bool, StoreError> {
        let _guard = lock(&self.lock);
        let mut r: Restrictions = self.load_or("restrictions.json", Restrictions::default)?;
        let before = r.blocked.len();
        r.blocked.retain(|&id| id != user_id);
        let removed = (r.blocked.len() != before) | r.restricted.remove(&user_id).is_some();
        if removed {
            self.write("restrictions.json", &r)?;
        }
        Ok(removed)
    }

    /// Blocked, or restricted until a time still in the future. Expired
    /// restrictions are deleted as a side effect.
    pub fn is_restricted(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let _guard = lock(&self.lock);
        let mut r: Restrictions = self.load_or("restrictions.json", Restrictions::default)?;
        if r.blocked.contains(&user_id) {
            return Ok(true);
        }
        let Some(restriction) = r.restricted.get(&user_id) else {
            return Ok(false);
        };
        if parse_timestamp(&restriction.end_time).is_some_and(|end| now < end) {
            return Ok(true);
        }
        r.restricted.remove(&user_id);
        self.write("restrictions.json", &r)?;
        Ok(false)
    }

    /// Blocked users first, then unexpired timed restrictions.
    pub fn active_restrictions(&self, now: DateTime<Utc>) -> Result<Vec<RestrictionEntry>, StoreError> {
        let _guard = lock(&self.lock);
        let r: Restrictions = self.load_or("restrictions.json", Restrictions::default)?;
        let mut entries: Vec<RestrictionEntry> = r.blocked.iter().map(|&id| RestrictionEntry::Blocked(id)).collect();
        entries.extend(
            r.restricted
                .into_iter()
                .filter(|(_, res)| parse_timestamp(&res.end_time).is_some_and(|end| now < end))
                .map(|(user_id, restriction)| RestrictionEntry::Timed { user_id, restriction }),
        );
        Ok(entries)
    }
}

fn count_active_on(users: &BTreeMap<i64, UserRecord>, now: DateTime<Utc>) -> u64 {
    let today = now.date_naive();
    users
        .values()
        .filter(|u| parse_timestamp(&u.last_active).is_some_and(|t| t.date_naive() == today))
        .count() as u64
}

/// Slice out `page` (clamped to the last page) and report the page count (at least 1).
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> (Vec<T>, usize) {
    let per_page = per_page.max(1);
    let pages = items.len().div_ceil(per_page).max(1);
    let page = page.min(pages - 1);
    let slice = items.into_iter().skip(page * per_page).take(per_page).collect();
    (slice, pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    fn store() -> (TempDir, AdminStore) {
        let dir = TempDir::new().unwrap();
        let store = AdminStore::new(dir.path(), 1).unwrap();
        (dir, store)
    }

    #[test]
    fn test_owner_is_admin_and_cannot_be_removed() {
        let (_dir, store) = store();
        assert!(store.is_admin(1).unwrap());
        assert!(!store.remove_admin(1).unwrap());
        assert!(store.add_admin(2).unwrap());
        assert!(!store.add_admin(2).unwrap());
        assert!(store.is_admin(2).unwrap());
        assert!(store.remove_admin(2).unwrap());
        assert!(!store.is_admin(2).unwrap());
    }

    #[test]
    fn test_reopen_keeps_admins() {
        let dir = TempDir::new().unwrap();
        AdminStore::new(dir.path(), 1).unwrap().add_admin(5).unwrap();
        let store = AdminStore::new(dir.path(), 1).unwrap();
        assert_eq!(store.admins().unwrap(), vec![1, 5]);
    }

    #[test]
    fn test_activity_counters() {
        let (_dir, store) = store();
        store.record_activity(10, Some("alice"), None, at(1, 9)).unwrap();
        store.record_activity(10, Some("alice"), Some(ActionKind::Search), at(1, 10)).unwrap();
        store.record_activity(11, None, Some(ActionKind::Summary), at(2, 10)).unwrap();

        let stats = store.statistics(at(2, 12)).unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_searches, 1);
        assert_eq!(stats.total_summaries, 1);
        assert_eq!(stats.active_users_today, 1);

        let (page, pages) = store.users_page(0, 10).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(page[0].0, 11);
        assert_eq!(page[1].1.username.as_deref(), Some("alice"));
        assert_eq!(page[1].1.actions.searches, 1);
        assert_eq!(page[1].1.total_actions, 1);
    }

    #[test]
    fn test_corrupt_files_fall_back_to_defaults() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("bot_data/restrictions.json"), "not json").unwrap();
        std::fs::write(dir.path().join("bot_data/users.json"), "{").unwrap();

        assert!(!store.is_restricted(42, at(1, 0)).unwrap());
        store.record_activity(42, Some("carol"), None, at(1, 0)).unwrap();
        assert_eq!(store.user_ids().unwrap(), vec![42]);

        std::fs::write(dir.path().join("bot_data/admins.json"), "not json").unwrap();
        let reopened = AdminStore::new(dir.path(), 1).unwrap();
        assert_eq!(reopened.admins().unwrap(), vec![1]);
    }

    #[test]
    fn test_resolve_user() {
        let (_dir, store) = store();
        store.record_activity(42, Some("Bob"), None, at(1, 0)).unwrap();
        assert_eq!(store.resolve_user("@bob").unwrap(), Some(42));
        assert_eq!(store.resolve_user("77").unwrap(), Some(77));
        assert_eq!(store.resolve_user("@nobody").unwrap(), None);
        assert_eq!(store.resolve_user("abc").unwrap(), None);
    }

    #[test]
    fn test_active_since() {
        let (_dir, store) = store();
        store.record_activity(1, None, None, at(1, 0)).unwrap();
        store.record_activity(2, None, None, at(3, 0)).unwrap();
        assert_eq!(store.active_since(at(3, 12), 24).unwrap(), vec![2]);
    }

    #[test]
    fn test_restriction_expires_lazily() {
        let (dir, store) = store();
        store.restrict(9, at(2, 0), 1, "spam").unwrap();
        assert!(store.is_restricted(9, at(1, 23)).unwrap());
        assert_eq!(store.active_restrictions(at(1, 23)).unwrap().len(), 1);

        assert!(!store.is_restricted(9, at(2, 0)).unwrap());
        let raw = std::fs::read_to_string(dir.path().join("bot_data/restrictions.json")).unwrap();
        assert!(!raw.contains("spam"));
    }

    #[test]
    fn test_block_and_unrestrict() {
        let (_dir, store) = store();
        assert!(store.block(4).unwrap());
        assert!(!store.block(4).unwrap());
        store.restrict(5, at(30, 0), 1, "").unwrap();

        let entries = store.active_restrictions(at(1, 0)).unwrap();
        assert_eq!(entries[0], RestrictionEntry::Blocked(4));
        match &entries[1] {
            RestrictionEntry::Timed { user_id, restriction } => {
                assert_eq!(*user_id, 5);
                assert_eq!(restriction.reason, "No reason provided");
            }
            other => panic!("unexpected entry {other:?}"),
        }

        assert!(store.is_restricted(4, at(1, 0)).unwrap());
        assert!(store.unrestrict(4).unwrap());
        assert!(!store.unrestrict(4).unwrap());
        assert!(!store.is_restricted(4, at(1, 0)).unwrap());
    }

    #[test]
    fn test_paginate() {
        let (items, pages) = paginate((0..23).collect::<Vec<_>>(), 2, 10);
        assert_eq!(pages, 3);
        assert_eq!(items, vec![20, 21, 22]);
        let (items, pages) = paginate(Vec::<u8>::new(), 5, 10);
        assert_eq!(pages, 1);
        assert!(items.is_empty());
        let (items, _) = paginate((0..5).collect::<Vec<_>>(), 9, 2);
        assert_eq!(items, vec![4]);
    }
}
