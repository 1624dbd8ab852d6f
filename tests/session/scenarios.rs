//! End-to-end scenarios on the `User` model.

use crate::common::*;

#[test]
fn no_users_first_or_null_is_none() {
    let store = test_store();
    let user = user_type();
    store
        .transactional(|session| {
            assert!(user.all(session)?.first_or_null()?.is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn inserted_user_is_visible_in_session() {
    let store = test_store();
    let user = user_type();
    store
        .transactional(|session| {
            new_user(session, "test", 1);
            let first = user.all(session)?.first_or_null()?;
            let first = first.expect("user inserted in this session");
            assert_eq!(first.get_property("login")?, Some(Value::from("test")));
            assert_eq!(first.get_property("skill")?, Some(Value::Int(1)));
            Ok(())
        })
        .unwrap();
}

#[test]
fn supervisor_not_null_excludes_boss() {
    let store = test_store();
    let user = user_type();
    store
        .transactional(|session| {
            let boss = new_user(session, "boss", 555);
            let worker = new_user(session, "user1", 5);
            worker.set_link("supervisor", Some(&boss))?;

            let supervised = user.query(session, link("supervisor").ne_null())?;
            assert!(supervised.is_pushed_down());
            assert_eq!(supervised.size()?, 1);
            assert!(supervised.first()?.ptr_eq(&worker));
            Ok(())
        })
        .unwrap();
    assert_eq!(open_cursors(&store), 0);
}

#[test]
fn committed_users_visible_to_next_session() {
    let store = test_store();
    seed_users(&store, 3);
    let count = store
        .transactional(|session| session.all("User")?.size())
        .unwrap();
    assert_eq!(count, 3);
}
