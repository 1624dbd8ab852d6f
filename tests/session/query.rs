//! Lazy queries: first / first_or_null / size, push-down and scans.

use crate::common::*;

// ============================================================================
// Terminal operations
// ============================================================================

#[test]
fn first_on_empty_sequence_is_not_found() {
    let store = test_store();
    let session = store.begin_session();
    let users = user_type().all(&session).unwrap();

    assert!(users.first_or_null().unwrap().is_none());
    assert!(users.first().unwrap_err().is_not_found());
    assert!(users.is_empty().unwrap());
    assert_eq!(users.size().unwrap(), 0);
    assert_eq!(open_cursors(&store), 0);
}

#[test]
fn first_equals_first_or_null() {
    let store = test_store();
    seed_users(&store, 4);
    let session = store.begin_session();
    let query = session.query("User", property("skill").ne(0)).unwrap();

    let first = query.first().unwrap();
    let first_or_null = query.first_or_null().unwrap().unwrap();
    assert!(first.ptr_eq(&first_or_null));
    assert_eq!(first.get_property("login").unwrap(), Some(Value::from("user1")));
    assert!(!query.is_empty().unwrap());
}

#[test]
fn first_or_null_stops_at_the_match() {
    let store = test_store();
    seed_users(&store, 10);
    let session = store.begin_session();

    let first = session.all("User").unwrap().first_or_null().unwrap();
    assert!(first.is_some());
    assert_eq!(session.cached_entities(), 1);
    assert_eq!(open_cursors(&store), 0);
}

#[test]
fn size_equals_drained_match_count() {
    let store = test_store();
    seed_users(&store, 8);
    let session = store.begin_session();

    let predicates = vec![
        property("skill").ne(3),
        property("login").eq("user5"),
        property("login").eq("user5").or(property("skill").eq(7)),
        property("nickname").eq_null(),
        property("nickname").ne_null(),
        link("supervisor").eq_null(),
    ];
    for predicate in predicates {
        let query = session.query("User", predicate.clone()).unwrap();
        let drained = query.iter().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(query.size().unwrap(), drained.len(), "{:?}", predicate);
    }
    assert_eq!(open_cursors(&store), 0);
}

// ============================================================================
// Push-down
// ============================================================================

#[test]
fn pushed_down_size_materializes_nothing() {
    let store = test_store();
    seed_users(&store, 5);
    let session = store.begin_session();

    let query = session.query("User", property("login").eq("user3")).unwrap();
    assert!(query.is_pushed_down());
    assert_eq!(query.size().unwrap(), 1);
    assert_eq!(session.cached_entities(), 0);
}

#[test]
fn scan_caches_every_visited_candidate() {
    let store = test_store();
    seed_users(&store, 5);
    let session = store.begin_session();

    let query = session.query("User", property("skill").eq(2).or(property("skill").eq(4))).unwrap();
    assert!(!query.is_pushed_down());
    assert_eq!(query.size().unwrap(), 2);
    assert_eq!(session.cached_entities(), 5);
}

#[test]
fn and_pushes_one_side_and_filters_the_other() {
    let store = test_store();
    let session = store.begin_session();
    let boss = new_user(&session, "boss", 100);
    let a = new_user(&session, "a", 1);
    let b = new_user(&session, "b", 2);
    a.set_link("supervisor", Some(&boss)).unwrap();
    b.set_link("supervisor", Some(&boss)).unwrap();

    let query = session
        .query(
            "User",
            property("skill").ne(1).and(link("supervisor").ne_null()),
        )
        .unwrap();
    assert!(query.is_pushed_down());
    let matches: Vec<_> = query.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(matches, vec![b]);
}

#[test]
fn link_equality_uses_link_index() {
    let store = test_store();
    let session = store.begin_session();
    let boss = new_user(&session, "boss", 100);
    let other_boss = new_user(&session, "other", 50);
    let a = new_user(&session, "a", 1);
    let b = new_user(&session, "b", 2);
    a.set_link("supervisor", Some(&boss)).unwrap();
    b.set_link("supervisor", Some(&other_boss)).unwrap();

    let query = session.query("User", link("supervisor").eq(&boss)).unwrap();
    assert!(query.is_pushed_down());
    assert!(query.first().unwrap().ptr_eq(&a));
    assert_eq!(query.size().unwrap(), 1);

    let not_boss = session.query("User", link("supervisor").ne(&boss)).unwrap();
    assert!(!not_boss.is_pushed_down());
    assert_eq!(not_boss.size().unwrap(), 3);
}

#[test]
fn renamed_link_predicates_match_persisted_links() {
    let store = test_store();
    let session = store.begin_session();
    let boss = new_user(&session, "boss", 100);
    let worker = new_user(&session, "worker", 1);
    worker.set_link("supervisor", Some(&boss)).unwrap();

    // an unregistered type with the same rename resolves identically
    let ad_hoc = EntityType::new("User").renamed_link("supervisor", "boss");
    let by_type = ad_hoc.query(&session, link("supervisor").eq_null()).unwrap();
    let by_kind = session.query("User", link("supervisor").eq_null()).unwrap();
    assert!(by_type.first().unwrap().ptr_eq(&boss));
    assert!(by_kind.first().unwrap().ptr_eq(&boss));
}

#[test]
fn unknown_kind_is_empty() {
    let store = test_store();
    let session = store.begin_session();
    let issues = session.all("Issue").unwrap();
    assert_eq!(issues.kind(), "Issue");
    assert!(issues.is_empty().unwrap());
}

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn abandoned_query_iterator_releases_cursor() {
    let store = quiet_store();
    seed_users(&store, 5);
    let session = store.begin_session();
    {
        let mut iter = session.all("User").unwrap().iter().unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert_eq!(open_cursors(&store), 1);
    }
    assert_eq!(open_cursors(&store), 0);
}

#[test]
fn query_on_closed_session_fails() {
    let store = test_store();
    let session = store.begin_session();
    let users = session.all("User").unwrap();
    session.abort().unwrap();

    assert!(users.size().unwrap_err().is_session_closed());
    assert!(session.all("User").unwrap_err().is_session_closed());
}
