//! Store behavior across reopen, the way the bot sees it after a restart.

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use paperpilot::store::admin::{ActionKind, RestrictionEntry};
use paperpilot::store::{AdminStore, NotificationStore, PreferenceStore};

#[test]
fn test_preferences_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = PreferenceStore::new(dir.path()).unwrap();
        store.update(5, |p| p.add_journal("Nature")).unwrap();
        store.update(5, |p| p.toggle_category("cs.CL")).unwrap();
        store.set_max_results(5, 20).unwrap();
    }

    let store = PreferenceStore::new(dir.path()).unwrap();
    let prefs = store.get(5).unwrap();
    assert_eq!(prefs.specific_journals, vec!["Nature".to_string()]);
    assert_eq!(prefs.preferred_categories, vec!["cs.CL".to_string()]);
    assert_eq!(prefs.max_results, 20);
}

#[test]
fn test_notification_digest_cycle() {
    let dir = TempDir::new().unwrap();
    let store = NotificationStore::new(dir.path()).unwrap();
    let monday = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();

    assert!(!store.should_notify(11, monday).unwrap());
    store
        .update(11, |s| {
            s.enabled = true;
            s.add_keyword("Diffusion");
        })
        .unwrap();
    assert!(store.should_notify(11, monday).unwrap());

    store.update(11, |s| s.mark_checked(monday)).unwrap();
    let reopened = NotificationStore::new(dir.path()).unwrap();
    assert!(!reopened.should_notify(11, monday + Duration::hours(1)).unwrap());
    assert!(reopened.should_notify(11, monday + Duration::days(1)).unwrap());
    assert_eq!(reopened.get(11).unwrap().keywords, vec!["diffusion".to_string()]);
    assert_eq!(reopened.user_ids().unwrap(), vec![11]);
}

#[test]
fn test_admin_restriction_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = AdminStore::new(dir.path(), 1).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();

    store.record_activity(30, Some("carol"), Some(ActionKind::Search), now).unwrap();
    assert_eq!(store.resolve_user("@Carol").unwrap(), Some(30));

    store.restrict(30, now + Duration::hours(2), 1, "").unwrap();
    assert!(store.is_restricted(30, now).unwrap());
    match &store.active_restrictions(now).unwrap()[..] {
        [RestrictionEntry::Timed { user_id, restriction }] => {
            assert_eq!(*user_id, 30);
            assert_eq!(restriction.reason, "No reason provided");
        }
        other => panic!("unexpected restrictions: {other:?}"),
    }

    // Expired restrictions are dropped on the next check
    assert!(!store.is_restricted(30, now + Duration::hours(3)).unwrap());
    assert!(store.active_restrictions(now).unwrap().is_empty());

    assert!(store.block(30).unwrap());
    let reopened = AdminStore::new(dir.path(), 1).unwrap();
    assert!(reopened.is_restricted(30, now).unwrap());
    assert!(reopened.unrestrict(30).unwrap());
    assert!(!reopened.is_restricted(30, now).unwrap());

    let stats = reopened.statistics(now).unwrap();
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.total_searches, 1);
    assert_eq!(stats.active_users_today, 1);
}
