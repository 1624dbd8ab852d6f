//! Quantified properties of the adapter and lazy sequences.

use crate::common::*;
use proptest::prelude::*;

fn drain_ids(session: &TransientSession) -> Vec<TransientEntity> {
    session
        .get_all("User")
        .expect("open iterator")
        .proxies()
        .collect::<Result<_, _>>()
        .expect("drain")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_skip_then_drain_matches_drain_then_discard(
        (n, k) in (0usize..24).prop_flat_map(|n| (Just(n), 0..=n)),
    ) {
        let store = quiet_store();
        seed_users(&store, n);
        let session = store.begin_session();

        let mut skipped = session.get_all("User").unwrap();
        prop_assert!(skipped.skip(k));
        let rest: Vec<_> = skipped.proxies().collect::<Result<_, _>>().unwrap();

        let full = drain_ids(&session);
        prop_assert_eq!(full.len(), n);
        prop_assert_eq!(&rest[..], &full[k..]);
        prop_assert_eq!(open_cursors(&store), 0);
    }

    #[test]
    fn prop_skip_past_end_reports_false(n in 0usize..16, extra in 1usize..8) {
        let store = quiet_store();
        seed_users(&store, n);
        let session = store.begin_session();

        let mut users = session.get_all("User").unwrap();
        prop_assert!(!users.skip(n + extra));
        prop_assert!(!users.has_next());
        prop_assert!(users.dispose().unwrap());
    }

    #[test]
    fn prop_size_equals_drained_count(n in 0usize..20, threshold in 0i64..20) {
        let store = quiet_store();
        seed_users(&store, n);
        let session = store.begin_session();

        let by_scan = session.query("User", property("skill").ne(threshold)).unwrap();
        let drained = by_scan.iter().unwrap().count();
        prop_assert_eq!(by_scan.size().unwrap(), drained);
        prop_assert_eq!(drained, if (threshold as usize) < n { n - 1 } else { n });

        let by_index = session.query("User", property("skill").eq(threshold)).unwrap();
        prop_assert!(by_index.is_pushed_down());
        prop_assert_eq!(by_index.size().unwrap(), by_index.iter().unwrap().count());
    }

    #[test]
    fn prop_drained_proxies_resolve_identically(n in 1usize..16) {
        let store = quiet_store();
        let ids = seed_users(&store, n);
        let session = store.begin_session();

        let drained = drain_ids(&session);
        for (proxy, id) in drained.iter().zip(&ids) {
            prop_assert!(proxy.ptr_eq(&session.resolve(*id).unwrap()));
        }
        prop_assert_eq!(session.cached_entities(), n);
    }
}
