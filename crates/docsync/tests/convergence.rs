mod common;

use common::{actor, add, head, mv, remove, set_root, ticket};
use docsync::{ActorId, Applied, Document, ElementValue, Executor, Operation, Primitive, Root, Ticket};
use serde_json::json;

fn replay(ops: &[Operation]) -> (Root, Executor) {
    let mut root = Root::new();
    let mut exec = Executor::default();
    for op in ops {
        exec.apply(op.clone(), &mut root).unwrap();
    }
    (root, exec)
}

fn list_op() -> (Operation, Ticket) {
    let list = ticket(1, 1, 1);
    (set_root("list", ElementValue::Array, list), list)
}

#[test]
fn concurrent_inserts_at_head_later_ticket_first() {
    let (mk, list) = list_op();
    let from_x = add(list, head(), "a", ticket(2, 1, 1));
    let from_y = add(list, head(), "b", ticket(2, 1, 2));

    let (r1, _) = replay(&[mk.clone(), from_x.clone(), from_y.clone()]);
    let (r2, _) = replay(&[mk, from_y, from_x]);

    assert_eq!(r1.view(), json!({ "list": ["b", "a"] }));
    assert_eq!(r1.view(), r2.view());
}

#[test]
fn concurrent_sets_higher_ticket_wins() {
    let t1 = ticket(2, 1, 1);
    let t2 = ticket(2, 1, 2);
    let from_x = set_root("k", Primitive::from(1i32), t1);
    let from_y = set_root("k", Primitive::from(2i32), t2);

    let (r1, _) = replay(&[from_x.clone(), from_y.clone()]);
    let (r2, _) = replay(&[from_y, from_x]);

    assert_eq!(r1.view(), json!({ "k": 2 }));
    assert_eq!(r2.view(), json!({ "k": 2 }));
    for root in [&r1, &r2] {
        let loser = root.find_by_created_at(&t1).unwrap();
        assert_eq!(loser.as_primitive(), Some(&Primitive::Integer(1)));
        assert!(loser.is_removed());
    }
}

#[test]
fn insert_after_concurrently_removed_anchor() {
    let (mk, list) = list_op();
    let e = ticket(2, 1, 1);
    let base = vec![mk, add(list, head(), "e", e)];
    let rm = remove(list, e, ticket(3, 1, 1));
    let ins = add(list, e, "n", ticket(3, 1, 2));

    let mut one = base.clone();
    one.extend([rm.clone(), ins.clone()]);
    let mut two = base;
    two.extend([ins, rm]);

    let (r1, _) = replay(&one);
    let (r2, _) = replay(&two);
    assert_eq!(r1.view(), json!({ "list": ["n"] }));
    assert_eq!(r1.view(), r2.view());

    let array = r1.find_by_created_at(&list).unwrap().as_array().unwrap();
    let chain: Vec<Ticket> = array.elements.iter().collect();
    assert_eq!(chain, vec![e, ticket(3, 1, 2)]);
}

#[test]
fn duplicate_add_is_noop() {
    let (mk, list) = list_op();
    let op = add(list, head(), "a", ticket(2, 1, 1));
    let (mut root, mut exec) = replay(&[mk, op.clone()]);
    assert_eq!(exec.apply(op, &mut root).unwrap(), Applied::Duplicate);
    let array = root.find_by_created_at(&list).unwrap().as_array().unwrap();
    assert_eq!(array.len(root.index()), 1);
}

#[test]
fn removal_keeps_identity_and_anchor() {
    let (mk, list) = list_op();
    let e = ticket(2, 1, 1);
    let (mut root, mut exec) = replay(&[mk, add(list, head(), "e", e), remove(list, e, ticket(3, 1, 1))]);

    let tomb = root.find_by_created_at(&e).unwrap();
    assert_eq!(tomb.created_at(), e);
    assert!(tomb.is_removed());

    exec.apply(add(list, e, "after", ticket(4, 1, 1)), &mut root).unwrap();
    let array = root.find_by_created_at(&list).unwrap().as_array().unwrap();
    let chain: Vec<Ticket> = array.elements.iter().collect();
    assert_eq!(chain, vec![e, ticket(4, 1, 1)]);
}

#[test]
fn dependent_op_waits_for_parent() {
    let (mk, list) = list_op();
    let child = add(list, head(), "a", ticket(2, 1, 1));
    let (r1, e1) = replay(&[child.clone(), mk.clone()]);
    let (r2, _) = replay(&[mk, child]);
    assert_eq!(e1.pending_len(), 0);
    assert_eq!(r1.view(), r2.view());
}

#[test]
fn documents_converge_on_text() {
    let mut a = Document::new("doc", actor(1));
    let mut b = Document::new("doc", actor(2));

    let mut text = None;
    let base = a
        .update(None, |ctx| {
            let root = ctx.root_created_at();
            let t = ctx.set(root, "body", ElementValue::Text)?;
            ctx.edit(t, 0, 0, "abcd")?;
            text = Some(t);
            Ok(())
        })
        .unwrap();
    let text = text.unwrap();
    b.apply_changes(vec![base]).unwrap();

    let delete = a.update(None, |ctx| ctx.edit(text, 1, 3, "")).unwrap();
    let insert = b.update(None, |ctx| ctx.edit(text, 2, 2, "Z")).unwrap();

    a.apply_changes(vec![insert]).unwrap();
    b.apply_changes(vec![delete]).unwrap();

    assert_eq!(a.view(), json!({ "body": "aZd" }));
    assert_eq!(a.view(), b.view());
}

#[test]
fn documents_converge_on_concurrent_text_inserts() {
    let mut a = Document::new("doc", actor(1));
    let mut b = Document::new("doc", actor(2));

    let mut text = None;
    let base = a
        .update(None, |ctx| {
            let t = ctx.set(ctx.root_created_at(), "body", ElementValue::Text)?;
            ctx.edit(t, 0, 0, "ac")?;
            text = Some(t);
            Ok(())
        })
        .unwrap();
    let text = text.unwrap();
    b.apply_changes(vec![base]).unwrap();

    let from_a = a.update(None, |ctx| ctx.edit(text, 1, 1, "X")).unwrap();
    let from_b = b.update(None, |ctx| ctx.edit(text, 1, 1, "Y")).unwrap();
    a.apply_changes(vec![from_b]).unwrap();
    b.apply_changes(vec![from_a]).unwrap();

    assert_eq!(a.view(), b.view());
    let body = a.view()["body"].as_str().unwrap().to_string();
    assert_eq!(body.len(), 4);
    assert!(body.starts_with('a') && body.ends_with('c'));
}

#[test]
fn garbage_collection_after_removal() {
    let mut doc = Document::new("doc", actor(1));
    doc.update(None, |ctx| {
        let root = ctx.root_created_at();
        let list = ctx.set(root, "list", ElementValue::Array)?;
        ctx.push(list, Primitive::from("a"))?;
        ctx.push(list, Primitive::from("b"))?;
        Ok(())
    })
    .unwrap();
    let removal = doc
        .update(None, |ctx| ctx.remove_key(ctx.root_created_at(), "list"))
        .unwrap();
    let removed_at = removal.operations[0].executed_at();

    assert_eq!(doc.root().tombstone_count(), 1);
    assert_eq!(doc.garbage_collect(&removed_at), 3);
    assert_eq!(doc.root().element_count(), 1);
    assert_eq!(doc.view(), json!({}));
}

/// List `[a, b, c]` created by actor 1 at lamports 2..=4.
fn abc() -> (Vec<Operation>, Ticket, [Ticket; 3]) {
    let (mk, list) = list_op();
    let (a, b, c) = (ticket(2, 1, 1), ticket(3, 1, 1), ticket(4, 1, 1));
    let ops = vec![mk, add(list, head(), "a", a), add(list, a, "b", b), add(list, b, "c", c)];
    (ops, list, [a, b, c])
}

fn replay_with(base: &[Operation], tail: &[Operation]) -> Root {
    let mut ops = base.to_vec();
    ops.extend_from_slice(tail);
    replay(&ops).0
}

#[test]
fn move_and_insert_at_same_anchor_converge() {
    let (base, list, [_, _, c]) = abc();
    let to_front = mv(list, head(), c, ticket(5, 1, 1));
    let insert = add(list, head(), "n", ticket(5, 1, 2));

    let r1 = replay_with(&base, &[to_front.clone(), insert.clone()]);
    let r2 = replay_with(&base, &[insert, to_front]);
    assert_eq!(r1.view(), json!({ "list": ["n", "c", "a", "b"] }));
    assert_eq!(r1.view(), r2.view());
}

#[test]
fn move_of_concurrently_removed_element() {
    let (base, list, [_, b, _]) = abc();
    let to_front = mv(list, head(), b, ticket(5, 1, 1));
    let rm = remove(list, b, ticket(5, 1, 2));

    let mut r1 = replay_with(&base, &[to_front.clone(), rm.clone()]);
    let r2 = replay_with(&base, &[rm, to_front]);
    assert_eq!(r1.view(), json!({ "list": ["a", "c"] }));
    assert_eq!(r1.view(), r2.view());
    for root in [&r1, &r2] {
        let moved = root.find_by_created_at(&b).unwrap();
        assert!(moved.is_removed());
        assert_eq!(moved.moved_at(), Some(ticket(5, 1, 1)));
    }

    // The moved tombstone still anchors inserts at its new place.
    let mut exec = Executor::default();
    exec.apply(add(list, b, "x", ticket(6, 1, 1)), &mut r1).unwrap();
    assert_eq!(r1.view(), json!({ "list": ["x", "a", "c"] }));
}

#[test]
fn concurrent_moves_last_mover_wins() {
    let (base, list, [a, b, c]) = abc();
    let after_c = mv(list, c, a, ticket(5, 1, 1));
    let after_b = mv(list, b, a, ticket(5, 1, 2));

    let r1 = replay_with(&base, &[after_c.clone(), after_b.clone()]);
    let r2 = replay_with(&base, &[after_b, after_c]);
    assert_eq!(r1.view(), json!({ "list": ["b", "a", "c"] }));
    assert_eq!(r1.view(), r2.view());
}

#[test]
fn move_waits_for_its_target() {
    let (mk, list) = list_op();
    let (a, b) = (ticket(2, 1, 1), ticket(3, 1, 1));
    let add_a = add(list, head(), "a", a);
    let add_b = add(list, a, "b", b);
    let to_front = mv(list, head(), b, ticket(4, 1, 1));

    let (early, exec) = replay(&[mk.clone(), to_front.clone(), add_a.clone(), add_b.clone()]);
    let (in_order, _) = replay(&[mk, add_a, add_b, to_front]);
    assert_eq!(exec.pending_len(), 0);
    assert_eq!(early.view(), json!({ "list": ["b", "a"] }));
    assert_eq!(early.view(), in_order.view());
}

#[test]
fn changes_made_before_actor_assignment_converge() {
    let mut a = Document::new("doc", ActorId::INITIAL);
    let first = a
        .update(None, |ctx| {
            let root = ctx.root_created_at();
            ctx.set(root, "list", ElementValue::Array).map(drop)
        })
        .unwrap();
    let list = first.operations[0].executed_at();
    let second = a.update(None, |ctx| ctx.push(list, Primitive::from(1i32)).map(drop)).unwrap();

    let assigned = actor(4);
    a.set_actor(assigned).unwrap();
    let shipped = vec![first.set_actor(assigned), second.set_actor(assigned)];
    assert!(shipped.iter().all(|c| c.id.actor_id == assigned));

    let mut b = Document::new("doc", actor(5));
    let summary = b.apply_changes(shipped).unwrap();
    assert_eq!(summary.executed, 2);
    assert_eq!(b.pending_len(), 0);
    assert_eq!(a.view(), json!({ "list": [1] }));
    assert_eq!(a.view(), b.view());

    // Identities on the local replica were re-stamped too.
    let list = list.assign_actor(assigned);
    assert!(a.root().find_by_created_at(&list).is_some());
    let third = a.update(None, |ctx| ctx.push(list, Primitive::from(2i32)).map(drop)).unwrap();
    b.apply_changes(vec![third]).unwrap();
    assert_eq!(b.pending_len(), 0);
    assert_eq!(b.view(), json!({ "list": [1, 2] }));
    assert_eq!(a.view(), b.view());
}
