//! Identity cache: one proxy per persisted entity per session.

use crate::common::*;

#[test]
fn drained_proxies_equal_resolved_proxies() {
    let store = test_store();
    let ids = seed_users(&store, 6);
    let session = store.begin_session();

    let drained: Vec<_> = session
        .get_all("User")
        .unwrap()
        .proxies()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(drained.len(), ids.len());
    for (proxy, id) in drained.iter().zip(&ids) {
        assert_eq!(proxy.id(), *id);
        assert!(proxy.ptr_eq(&session.resolve(*id).unwrap()));
    }
    assert_eq!(session.cached_entities(), ids.len());
}

#[test]
fn every_access_path_returns_the_same_proxy() {
    let store = test_store();
    let session = store.begin_session();
    let boss = new_user(&session, "boss", 9);
    let worker = new_user(&session, "worker", 1);
    worker.set_link("supervisor", Some(&boss)).unwrap();

    let via_link = worker.get_link("supervisor").unwrap().unwrap();
    let via_get = session.get_entity(boss.id()).unwrap().unwrap();
    let via_query = session
        .query("User", property("login").eq("boss"))
        .unwrap()
        .first()
        .unwrap();
    let via_text = session
        .get_entity(session.to_entity_id(&boss.id().to_string()).unwrap())
        .unwrap()
        .unwrap();

    for other in [&via_link, &via_get, &via_query, &via_text] {
        assert!(boss.ptr_eq(other));
    }
    assert_eq!(session.cached_entities(), 2);
}

#[test]
fn sessions_do_not_share_proxies() {
    let store = test_store();
    let ids = seed_users(&store, 1);
    let a = store.begin_session();
    let b = store.begin_session();

    let in_a = a.get_entity(ids[0]).unwrap().unwrap();
    let in_b = b.get_entity(ids[0]).unwrap().unwrap();
    assert_eq!(in_a.id(), in_b.id());
    assert!(!in_a.ptr_eq(&in_b));
}

#[test]
fn proxy_caches_properties_and_sees_own_writes() {
    let store = test_store();
    let ids = seed_users(&store, 1);
    let session = store.begin_session();
    let user = session.get_entity(ids[0]).unwrap().unwrap();

    assert_eq!(user.get_property("login").unwrap(), Some(Value::from("user0")));
    user.set_property("login", "renamed").unwrap();
    assert_eq!(
        user.get_property("login").unwrap(),
        Some(Value::from("renamed"))
    );
    assert_eq!(user.delete_property("skill").unwrap(), Some(Value::Int(0)));
    assert_eq!(user.get_property("skill").unwrap(), None);

    // the same proxy reached again sees the same state
    let mut users = session.get_all("User").unwrap();
    let again = users.try_next().unwrap().unwrap();
    users.dispose().unwrap();
    assert!(again.ptr_eq(&user));
    assert_eq!(
        again.get_property("login").unwrap(),
        Some(Value::from("renamed"))
    );
}

#[test]
fn cache_is_cleared_at_session_end() {
    let store = test_store();
    let ids = seed_users(&store, 3);
    let session = store.begin_session();
    let proxies: Vec<_> = ids
        .iter()
        .map(|id| session.resolve(*id).unwrap())
        .collect();
    assert_eq!(session.cached_entities(), 3);

    session.abort().unwrap();
    assert_eq!(session.cached_entities(), 0);
    assert!(proxies.iter().all(|p| p.is_detached()));
    assert!(session.resolve(ids[0]).unwrap_err().is_session_closed());
}
