mod common;

use common::{add, head, set_root, ticket};
use docsync::{ActorId, ElementValue, Executor, LogicalClock, Operation, Root, Ticket};
use proptest::prelude::*;

fn ticket_strategy() -> impl Strategy<Value = Ticket> {
    (0u64..50, 0u32..4, 0u8..4).prop_map(|(lamport, delimiter, actor)| ticket(lamport, delimiter, actor))
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn order_is_total(a in ticket_strategy(), b in ticket_strategy()) {
        if a == b {
            prop_assert!(!a.after(&b) && !b.after(&a));
        } else {
            prop_assert!(a.after(&b) ^ b.after(&a));
        }
    }

    #[test]
    fn order_is_transitive(a in ticket_strategy(), b in ticket_strategy(), c in ticket_strategy()) {
        if a.after(&b) && b.after(&c) {
            prop_assert!(a.after(&c));
        }
    }

    #[test]
    fn merge_never_decreases(start in 0u64..100, remote in ticket_strategy()) {
        let mut clock = LogicalClock::new(ActorId::new([9; 12]));
        for _ in 0..start {
            clock.tick();
        }
        let before = clock.lamport();
        clock.merge(&remote);
        prop_assert!(clock.lamport() > before);
        prop_assert!(clock.lamport() > remote.lamport());
    }

    #[test]
    fn next_strictly_increases(n in 1usize..50) {
        let mut clock = LogicalClock::new(ActorId::new([1; 12]));
        clock.tick();
        let mut prev = clock.next();
        for _ in 0..n {
            let t = clock.next();
            prop_assert!(t.after(&prev));
            prev = t;
        }
    }

    /// Concurrent inserts from several actors after the head converge in any
    /// delivery order.
    #[test]
    fn concurrent_inserts_converge(order in Just((0..6).collect::<Vec<usize>>()).prop_shuffle()) {
        let list = ticket(1, 1, 0);
        let inserts: Vec<Operation> = (0..6u8)
            .map(|i| add(list, head(), &i.to_string(), ticket(2 + u64::from(i % 2), 1, i)))
            .collect();

        let apply = |seq: &[usize]| {
            let mut root = Root::new();
            let mut exec = Executor::default();
            exec.apply(set_root("list", ElementValue::Array, list), &mut root).unwrap();
            for &i in seq {
                exec.apply(inserts[i].clone(), &mut root).unwrap();
            }
            root.view()
        };

        let sorted: Vec<usize> = (0..6).collect();
        prop_assert_eq!(apply(&order), apply(&sorted));
    }
}
