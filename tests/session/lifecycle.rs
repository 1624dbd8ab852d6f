//! Session lifecycle: termination, isolation, conflicts and configuration.

use crate::common::*;
use std::cell::Cell;
use strata_transient::SessionState;
use tempfile::TempDir;

// ============================================================================
// Termination
// ============================================================================

#[test]
fn operations_after_close_report_session_closed() {
    let store = test_store();
    let session = store.begin_session();
    let user = new_user(&session, "u", 1);
    session.commit().unwrap();
    assert_eq!(session.state(), SessionState::Committed);

    assert!(session.new_entity("User").unwrap_err().is_session_closed());
    assert!(session.get_entity(user.id()).unwrap_err().is_session_closed());
    assert!(session.get_all("User").unwrap_err().is_session_closed());
    assert!(session.entity_types().unwrap_err().is_session_closed());
    assert!(session.flush().unwrap_err().is_session_closed());
    assert!(session.abort().unwrap_err().is_session_closed());
    assert!(user.get_link("supervisor").unwrap_err().is_session_closed());
    assert!(user.delete().unwrap_err().is_session_closed());
}

#[test]
fn abort_discards_changes() {
    let store = test_store();
    let session = store.begin_session();
    new_user(&session, "gone", 1);
    session.abort().unwrap();
    assert!(session.is_aborted());
    assert_eq!(store.persistent_store().entity_count(), 0);
}

#[test]
fn flush_publishes_and_keeps_working() {
    let store = test_store();
    let session = store.begin_session();
    let user = new_user(&session, "first", 1);
    session.flush().unwrap();
    assert_eq!(store.persistent_store().entity_count(), 1);

    user.set_property("login", "second").unwrap();
    session.commit().unwrap();

    let login = store
        .transactional(|s| s.all("User")?.first()?.get_property("login"))
        .unwrap();
    assert_eq!(login, Some(Value::from("second")));
}

#[test]
fn dropped_session_is_aborted() {
    let store = quiet_store();
    {
        let session = store.begin_session();
        new_user(&session, "dropped", 1);
        let _users = session.get_all("User").unwrap();
    }
    assert_eq!(store.persistent_store().entity_count(), 0);
    assert_eq!(open_cursors(&store), 0);
}

// ============================================================================
// Isolation and conflicts
// ============================================================================

#[test]
fn sessions_are_isolated_until_commit() {
    let store = test_store();
    let writer = store.begin_session();
    let reader = store.begin_session();
    new_user(&writer, "w", 1);

    assert_eq!(reader.all("User").unwrap().size().unwrap(), 0);
    writer.commit().unwrap();
    assert_eq!(reader.all("User").unwrap().size().unwrap(), 0);
    reader.commit().unwrap();

    let late = store.begin_session();
    assert_eq!(late.all("User").unwrap().size().unwrap(), 1);
}

#[test]
fn first_committer_wins() {
    let store = test_store();
    let a = store.begin_session();
    let b = store.begin_session();
    new_user(&a, "a", 1);
    new_user(&b, "b", 2);

    a.commit().unwrap();
    let err = b.commit().unwrap_err();
    assert!(err.is_conflict());
    assert!(b.is_aborted());
}

#[test]
fn flush_conflict_leaves_session_open_for_revert() {
    let store = test_store();
    let session = store.begin_session();
    let user = new_user(&session, "mine", 1);
    seed_users(&store, 1);

    assert!(session.flush().unwrap_err().is_conflict());
    assert!(session.is_open());

    session.revert().unwrap();
    assert!(user.is_detached());
    assert_eq!(session.all("User").unwrap().size().unwrap(), 1);
    new_user(&session, "retry", 2);
    session.commit().unwrap();
    assert_eq!(store.persistent_store().entity_count(), 2);
}

#[test]
fn transactional_with_retry_recovers_from_conflict() {
    let store = test_store();
    let attempts = Cell::new(0);
    let login = store
        .transactional_with_retry(|session| {
            attempts.set(attempts.get() + 1);
            let user = new_user(session, "retried", 1);
            if attempts.get() < 3 {
                seed_users(&store, 1);
            }
            user.get_property("login")
        })
        .unwrap();
    assert_eq!(login, Some(Value::from("retried")));
    assert_eq!(attempts.get(), 3);
    assert_eq!(store.persistent_store().entity_count(), 3);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_file_sets_retry_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(strata_transient::CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "flush_retry_on_conflict = 0\nwarn_on_implicit_release = false\n",
    )
    .unwrap();

    let config = TransientStoreConfig::from_file(&path).unwrap();
    assert_eq!(config.flush_retry_on_conflict, 0);
    assert_eq!(config.retry_delay_ms, 0);
    assert!(!config.warn_on_implicit_release);

    let store = TransientEntityStore::with_config(config);
    let attempts = Cell::new(0);
    let err = store
        .transactional_with_retry(|session| {
            attempts.set(attempts.get() + 1);
            session.new_entity("User")?;
            store.transactional(|other| other.new_entity("User").map(|_| ()))
        })
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(attempts.get(), 1);
}

#[test]
fn default_config_file_is_written_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(strata_transient::CONFIG_FILE_NAME);
    TransientStoreConfig::write_default_if_missing(&path).unwrap();
    let config = TransientStoreConfig::from_file(&path).unwrap();
    assert_eq!(config, TransientStoreConfig::default());
}
