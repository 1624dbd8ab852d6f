//! TransientIteratorAdapter: control operations and cursor release.

use crate::common::*;

// ============================================================================
// Dispose
// ============================================================================

#[test]
fn dispose_releases_once() {
    let store = test_store();
    seed_users(&store, 2);
    let session = store.begin_session();

    let mut users = session.get_all("User").unwrap();
    assert!(users.should_be_disposed());
    assert_eq!(open_cursors(&store), 1);

    assert!(users.dispose().unwrap());
    assert!(!users.dispose().unwrap());
    assert!(!users.should_be_disposed());
    assert_eq!(open_cursors(&store), 0);

    let stats = store.persistent_store().cursor_stats();
    assert_eq!(stats.opened_total, stats.released_total);
    session.abort().unwrap();
}

#[test]
fn exhaustion_through_proxies_releases_cursor() {
    let store = test_store();
    seed_users(&store, 3);
    let session = store.begin_session();

    let mut users = session.get_all("User").unwrap();
    let drained: Vec<_> = users.proxies().collect::<Result<_, _>>().unwrap();
    assert_eq!(drained.len(), 3);
    assert!(!users.should_be_disposed());
    assert_eq!(open_cursors(&store), 0);
    assert!(!users.dispose().unwrap());
    assert!(users.proxies().next().is_none());
}

#[test]
fn try_next_does_not_release_at_end() {
    let store = test_store();
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();
    assert!(users.try_next().unwrap().is_none());
    assert!(users.should_be_disposed());
    assert!(users.dispose().unwrap());
}

#[test]
fn drop_releases_abandoned_cursor() {
    let store = quiet_store();
    seed_users(&store, 5);
    let session = store.begin_session();
    {
        let mut users = session.get_all("User").unwrap();
        users.try_next().unwrap().unwrap();
        assert_eq!(open_cursors(&store), 1);
    }
    assert_eq!(open_cursors(&store), 0);
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn has_next_is_a_peek() {
    let store = test_store();
    seed_users(&store, 1);
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();

    assert!(users.has_next());
    assert!(users.has_next());
    assert!(users.try_next().unwrap().is_some());
    assert!(!users.has_next());
    users.dispose().unwrap();
}

#[test]
fn next_id_does_not_materialize() {
    let store = test_store();
    let ids = seed_users(&store, 4);
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();

    let mut seen = Vec::new();
    while let Some(id) = users.next_id() {
        seen.push(id);
    }
    assert_eq!(seen, ids);
    assert_eq!(session.cached_entities(), 0);
    users.dispose().unwrap();
}

#[test]
fn skip_reports_available_elements() {
    let store = test_store();
    let ids = seed_users(&store, 5);
    let session = store.begin_session();

    let mut users = session.get_all("User").unwrap();
    assert!(users.skip(3));
    assert_eq!(session.cached_entities(), 0);
    assert_eq!(users.try_next().unwrap().unwrap().id(), ids[3]);
    assert!(!users.skip(2));
    assert!(!users.has_next());
    assert!(users.skip(0));
    users.dispose().unwrap();

    let mut disposed = session.get_all("User").unwrap();
    disposed.dispose().unwrap();
    assert!(!disposed.skip(1));
}

#[test]
fn plain_iterator_has_no_link_name() {
    let store = test_store();
    seed_users(&store, 1);
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();
    assert!(!users.is_link_indexed());
    users.try_next().unwrap();
    assert_eq!(users.current_link_name(), None);
    users.dispose().unwrap();
}

#[test]
fn link_iterator_reports_persisted_link_name() {
    let store = test_store();
    let session = store.begin_session();
    let worker = new_user(&session, "worker", 1);
    let boss = new_user(&session, "boss", 2);
    let friend = new_user(&session, "friend", 3);
    worker.set_link("supervisor", Some(&boss)).unwrap();
    worker.add_link("friends", &friend).unwrap();

    let mut supervisors = worker.get_links("supervisor").unwrap();
    assert!(supervisors.is_link_indexed());
    assert_eq!(supervisors.current_link_name(), None);
    assert!(supervisors.try_next().unwrap().unwrap().ptr_eq(&boss));
    assert_eq!(supervisors.current_link_name(), Some("boss"));
    assert!(supervisors.try_next().unwrap().is_none());
    supervisors.dispose().unwrap();

    let mut friends = worker.get_links("friends").unwrap();
    assert!(friends.try_next().unwrap().unwrap().ptr_eq(&friend));
    assert_eq!(friends.current_link_name(), Some("friends"));
    friends.dispose().unwrap();
    session.abort().unwrap();
}

#[test]
fn link_writers_update_targets() {
    let store = test_store();
    let session = store.begin_session();
    let worker = new_user(&session, "worker", 1);
    let boss = new_user(&session, "boss", 2);
    let friend = new_user(&session, "friend", 3);

    worker.set_link("supervisor", Some(&boss)).unwrap();
    assert!(worker.get_link("supervisor").unwrap().unwrap().ptr_eq(&boss));
    worker.set_link("supervisor", None).unwrap();
    assert!(worker.get_link("supervisor").unwrap().is_none());

    assert!(worker.add_link("friends", &friend).unwrap());
    assert!(!worker.add_link("friends", &friend).unwrap());
    assert!(worker.delete_link("friends", &friend).unwrap());
    assert!(!worker.delete_link("friends", &friend).unwrap());
    assert!(worker.get_link("friends").unwrap().is_none());
    session.abort().unwrap();
}

// ============================================================================
// Remove
// ============================================================================

#[test]
fn remove_requires_positioned_element() {
    let store = test_store();
    let ids = seed_users(&store, 2);
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();

    assert!(users.remove().unwrap_err().is_invalid_state());

    let first = users.try_next().unwrap().unwrap();
    users.remove().unwrap();
    assert!(session.is_removed(&first).unwrap());
    assert!(users.remove().unwrap_err().is_invalid_state());

    assert!(users.skip(1));
    assert!(users.remove().unwrap_err().is_invalid_state());

    assert!(users.try_next().unwrap().is_none());
    assert!(users.remove().unwrap_err().is_invalid_state());
    users.dispose().unwrap();
    assert!(users.remove().unwrap_err().is_invalid_state());

    assert!(session.get_entity(ids[1]).unwrap().is_some());
}

#[test]
fn remove_drops_loaded_properties_of_cached_proxy() {
    let store = test_store();
    seed_users(&store, 2);
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();

    let first = users.try_next().unwrap().unwrap();
    assert_eq!(first.get_property("login").unwrap(), Some(Value::from("user0")));
    users.remove().unwrap();
    users.dispose().unwrap();

    assert!(session.is_removed(&first).unwrap());
    let err = first.get_property("login").unwrap_err();
    assert!(matches!(err, StrataError::EntityNotFound(_)));

    session.flush().unwrap();
    assert!(first.is_detached());
    assert!(first.get_property("login").unwrap_err().is_invalid_state());
    assert_eq!(session.cached_entities(), 0);
}

#[test]
fn remove_on_link_iterator_deletes_link_only() {
    let store = test_store();
    let session = store.begin_session();
    let owner = new_user(&session, "owner", 1);
    let a = new_user(&session, "a", 2);
    let b = new_user(&session, "b", 3);
    owner.add_link("friends", &a).unwrap();
    owner.add_link("friends", &b).unwrap();

    let mut friends = owner.get_links("friends").unwrap();
    assert!(friends.try_next().unwrap().unwrap().ptr_eq(&a));
    friends.remove().unwrap();
    friends.dispose().unwrap();

    assert!(!session.is_removed(&a).unwrap());
    let remaining: Vec<_> = owner
        .get_links("friends")
        .unwrap()
        .proxies()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(remaining, vec![b]);
}

#[test]
fn removed_entities_are_never_yielded() {
    let store = test_store();
    let ids = seed_users(&store, 3);
    let session = store.begin_session();

    let mut users = session.get_all("User").unwrap();
    session.get_entity(ids[1]).unwrap().unwrap().delete().unwrap();
    let seen: Vec<_> = users
        .proxies()
        .map(|u| u.map(|u| u.id()))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(seen, vec![ids[0], ids[2]]);
}

// ============================================================================
// Closed sessions
// ============================================================================

#[test]
fn adapter_outliving_session_fails_but_still_disposes() {
    let store = test_store();
    seed_users(&store, 2);
    let session = store.begin_session();
    let mut users = session.get_all("User").unwrap();
    session.commit().unwrap();

    let err = users.try_next().unwrap_err();
    assert!(err.is_session_closed());
    assert!(users.remove().unwrap_err().is_session_closed());
    assert!(users.dispose().unwrap());
    assert_eq!(open_cursors(&store), 0);
}
