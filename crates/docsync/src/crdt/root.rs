//! The document tree: an arena of elements keyed by `created_at`.
//!
//! Containers never own their children. An object's table and an array's
//! chain hold tickets, and the arena resolves them. A child → parent map
//! lets compaction unlink a purged element without walking the tree.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use super::element::{Element, ElementIndex, ObjectElement, SimpleElement};
use super::rht::RhtSet;
use super::text::{LatestByActor, TextPos};
use crate::error::ApplyError;
use crate::time::{Ticket, INITIAL_TICKET};

#[derive(Debug, Clone)]
pub struct Root {
    index: ElementIndex,
    parents: HashMap<Ticket, Ticket>,
}

impl Default for Root {
    fn default() -> Self {
        Self::new()
    }
}

impl Root {
    /// A root holding only the empty top-level object at [`INITIAL_TICKET`].
    pub fn new() -> Self {
        let mut index = ElementIndex::new();
        index.insert(
            INITIAL_TICKET,
            Element::Object(ObjectElement::new(INITIAL_TICKET)),
        );
        Self {
            index,
            parents: HashMap::new(),
        }
    }

    /// Identity of the top-level object.
    pub const fn root_created_at(&self) -> Ticket {
        INITIAL_TICKET
    }

    pub fn index(&self) -> &ElementIndex {
        &self.index
    }

    // ── Registry ───────────────────────────────────────────────────────────

    pub fn find_by_created_at(&self, created_at: &Ticket) -> Option<&Element> {
        self.index.get(created_at)
    }

    /// Make `element` reachable by identity. Structural placement is the
    /// caller's job and must happen in the same step.
    pub fn register_element(&mut self, element: Element) -> Result<(), ApplyError> {
        let created_at = element.created_at();
        if self.index.contains_key(&created_at) {
            return Err(ApplyError::DuplicateIdentity(created_at));
        }
        self.index.insert(created_at, element);
        Ok(())
    }

    /// Drop an element from the registry. Compaction only.
    pub fn deregister_element(&mut self, created_at: &Ticket) -> Option<Element> {
        self.parents.remove(created_at);
        self.index.remove(created_at)
    }

    pub fn parent_of(&self, created_at: &Ticket) -> Option<Ticket> {
        self.parents.get(created_at).copied()
    }

    pub fn element_count(&self) -> usize {
        self.index.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.index.values().filter(|e| e.is_removed()).count()
    }

    // ── Lookups with capability checks ─────────────────────────────────────

    fn resolve(&self, parent: &Ticket) -> Result<&Element, ApplyError> {
        self.index.get(parent).ok_or(ApplyError::NotFound(*parent))
    }

    fn mismatch(op: &'static str, expected: &'static str, found: &Element) -> ApplyError {
        ApplyError::TypeMismatch {
            op,
            expected,
            found: found.kind(),
            target: found.created_at(),
        }
    }

    fn ensure_new(&self, created_at: &Ticket) -> Result<(), ApplyError> {
        if self.index.contains_key(created_at) {
            return Err(ApplyError::DuplicateIdentity(*created_at));
        }
        Ok(())
    }

    fn link(&mut self, element: Element, parent: Ticket) {
        self.parents.insert(element.created_at(), parent);
        self.index.insert(element.created_at(), element);
    }

    fn retire(&mut self, created_at: &Ticket, at: Ticket) {
        if let Some(e) = self.index.get_mut(created_at) {
            e.remove(at);
        }
    }

    // ── Structural mutations ───────────────────────────────────────────────

    /// Set `key` of the object `parent` to a fresh element, last writer wins.
    ///
    /// Every member that loses the key is removed at the winning member's
    /// ticket, so a loser's `removed_at` is the newest member of its key and
    /// does not depend on delivery order.
    pub fn set_member(
        &mut self,
        parent: &Ticket,
        key: &str,
        value: &SimpleElement,
        executed_at: &Ticket,
    ) -> Result<(), ApplyError> {
        let container = self.resolve(parent)?;
        if container.as_object().is_none() {
            return Err(Self::mismatch("set", "object", container));
        }
        self.ensure_new(&value.created_at)?;

        let mut element = value.to_element();
        let (outcome, losers) = match self.index.get_mut(parent) {
            Some(Element::Object(o)) => {
                let outcome = o.members.set(key, value.created_at);
                let losers: Vec<Ticket> = match outcome {
                    RhtSet::Installed { .. } => o.members.members_before(key, &value.created_at).collect(),
                    RhtSet::Rejected { .. } => Vec::new(),
                };
                (outcome, losers)
            }
            _ => return Err(ApplyError::NotFound(*parent)),
        };
        match outcome {
            RhtSet::Installed { displaced } => {
                trace!(key, created_at = %value.created_at, ?displaced, %executed_at, "set installed");
                for old in losers {
                    self.retire(&old, value.created_at);
                }
            }
            RhtSet::Rejected { holder } => {
                trace!(key, %holder, created_at = %value.created_at, "set lost to newer holder");
                element.remove(holder);
            }
        }
        self.link(element, *parent);
        Ok(())
    }

    /// Insert a fresh element into the array `parent` right after `prev`.
    pub fn insert_after(
        &mut self,
        parent: &Ticket,
        prev: &Ticket,
        value: &SimpleElement,
        executed_at: &Ticket,
    ) -> Result<(), ApplyError> {
        let container = self.resolve(parent)?;
        let Some(array) = container.as_array() else {
            return Err(Self::mismatch("add", "array", container));
        };
        if !array.elements.contains(prev) {
            return Err(ApplyError::NotFound(*prev));
        }
        self.ensure_new(&value.created_at)?;

        if let Some(Element::Array(a)) = self.index.get_mut(parent) {
            a.elements.insert_after(prev, value.created_at, executed_at)?;
        }
        self.link(value.to_element(), *parent);
        Ok(())
    }

    /// Re-link `target` after `prev` inside the array `parent`.
    /// Returns whether the element moved.
    pub fn move_after(
        &mut self,
        parent: &Ticket,
        prev: &Ticket,
        target: &Ticket,
        executed_at: &Ticket,
    ) -> Result<bool, ApplyError> {
        let container = self.resolve(parent)?;
        let Some(array) = container.as_array() else {
            return Err(Self::mismatch("move", "array", container));
        };
        if array.elements.node(target).is_none() {
            return Err(ApplyError::NotFound(*target));
        }
        if !array.elements.contains(prev) {
            return Err(ApplyError::NotFound(*prev));
        }

        let moved = match self.index.get_mut(parent) {
            Some(Element::Array(a)) => a.elements.move_after(prev, target, executed_at)?,
            _ => false,
        };
        if moved {
            if let Some(e) = self.index.get_mut(target) {
                e.meta_mut().moved_at = Some(*executed_at);
            }
        }
        Ok(moved)
    }

    /// Tombstone the child `target` of the object or array `parent`.
    /// Returns whether the removal took effect.
    pub fn remove(
        &mut self,
        parent: &Ticket,
        target: &Ticket,
        executed_at: &Ticket,
    ) -> Result<bool, ApplyError> {
        let container = self.resolve(parent)?;
        let linked = match container {
            Element::Object(o) => o.members.contains(target),
            Element::Array(a) => a.elements.node(target).is_some(),
            other => return Err(Self::mismatch("remove", "object or array", other)),
        };
        if !linked {
            return Err(ApplyError::NotFound(*target));
        }
        let element = self
            .index
            .get_mut(target)
            .ok_or(ApplyError::NotFound(*target))?;
        Ok(element.remove(*executed_at))
    }

    /// Replace the range `from..to` of the text `parent` with `content`.
    pub fn edit_text(
        &mut self,
        parent: &Ticket,
        from: &TextPos,
        to: &TextPos,
        content: &str,
        executed_at: &Ticket,
        latest: Option<&LatestByActor>,
    ) -> Result<LatestByActor, ApplyError> {
        let container = self.resolve(parent)?;
        if container.as_text().is_none() {
            return Err(Self::mismatch("edit", "text", container));
        }
        match self.index.get_mut(parent) {
            Some(Element::Text(t)) => t.rga.edit(from, to, content, executed_at, latest),
            _ => Err(ApplyError::NotFound(*parent)),
        }
    }

    // ── Views ──────────────────────────────────────────────────────────────

    /// JSON rendering of the visible document.
    pub fn view(&self) -> Value {
        self.index
            .get(&INITIAL_TICKET)
            .map_or(Value::Null, |root| root.view(&self.index))
    }

    // ── Compaction ─────────────────────────────────────────────────────────

    /// Purge every tombstone removed at or before `ticket`, together with
    /// its descendants, and drop removed text chunks of the same age.
    ///
    /// Callers must only pass a ticket every replica has already seen;
    /// purged identities can no longer serve as anchors.
    pub fn garbage_collect(&mut self, ticket: &Ticket) -> usize {
        let mut candidates: Vec<Ticket> = self
            .index
            .values()
            .filter(|e| e.removed_at().is_some_and(|r| !r.after(ticket)))
            .map(Element::created_at)
            .filter(|t| *t != INITIAL_TICKET)
            .collect();
        candidates.sort();

        let mut purged = 0;
        for created_at in candidates {
            if !self.index.contains_key(&created_at) {
                continue;
            }
            if let Some(parent) = self.parents.get(&created_at).copied() {
                match self.index.get_mut(&parent) {
                    Some(Element::Object(o)) => {
                        o.members.purge(&created_at);
                    }
                    Some(Element::Array(a)) => {
                        a.elements.purge(&created_at);
                    }
                    _ => {}
                }
            }
            let mut stack = vec![created_at];
            while let Some(next) = stack.pop() {
                if let Some(element) = self.deregister_element(&next) {
                    stack.extend(element.child_tickets());
                    purged += 1;
                }
            }
        }

        for element in self.index.values_mut() {
            if let Element::Text(t) = element {
                purged += t.rga.purge(ticket);
            }
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::element::{ElementValue, Primitive};
    use crate::crdt::rga::RgaList;
    use crate::time::ActorId;

    fn x(lamport: u64) -> Ticket {
        Ticket::new(lamport, 1, ActorId::new([1; 12]))
    }

    fn y(lamport: u64) -> Ticket {
        Ticket::new(lamport, 1, ActorId::new([2; 12]))
    }

    fn prim(at: Ticket, v: i32) -> SimpleElement {
        SimpleElement::new(at, Primitive::from(v))
    }

    fn root_with_list() -> (Root, Ticket) {
        let mut root = Root::new();
        let list = x(1);
        root.set_member(&INITIAL_TICKET, "list", &SimpleElement::new(list, ElementValue::Array), &list)
            .unwrap();
        (root, list)
    }

    #[test]
    fn new_root_is_empty_object() {
        let root = Root::new();
        assert_eq!(root.view(), serde_json::json!({}));
        assert_eq!(root.element_count(), 1);
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut root = Root::new();
        root.register_element(prim(x(1), 1).to_element()).unwrap();
        assert_eq!(
            root.register_element(prim(x(1), 2).to_element()),
            Err(ApplyError::DuplicateIdentity(x(1)))
        );
    }

    #[test]
    fn lww_keeps_loser_by_identity() {
        let mut root = Root::new();
        root.set_member(&INITIAL_TICKET, "k", &prim(y(2), 2), &y(2)).unwrap();
        root.set_member(&INITIAL_TICKET, "k", &prim(x(2), 1), &x(2)).unwrap();
        assert_eq!(root.view(), serde_json::json!({ "k": 2 }));
        let loser = root.find_by_created_at(&x(2)).unwrap();
        assert!(loser.is_removed());
        assert_eq!(root.tombstone_count(), 1);
    }

    fn apply_sets(order: &[Ticket]) -> Root {
        let mut root = Root::new();
        for (i, at) in order.iter().enumerate() {
            root.set_member(&INITIAL_TICKET, "k", &prim(*at, i as i32), at).unwrap();
        }
        root
    }

    fn removal_stamps(root: &Root, tickets: &[Ticket]) -> Vec<Option<Ticket>> {
        tickets
            .iter()
            .map(|t| root.find_by_created_at(t).unwrap().removed_at())
            .collect()
    }

    #[test]
    fn lww_loser_stamp_independent_of_order() {
        let (low, high) = (x(2), y(5));
        let mut winner_first = apply_sets(&[high, low]);
        let mut loser_first = apply_sets(&[low, high]);

        assert_eq!(removal_stamps(&winner_first, &[low, high]), vec![Some(high), None]);
        assert_eq!(removal_stamps(&loser_first, &[low, high]), vec![Some(high), None]);

        assert_eq!(winner_first.garbage_collect(&x(3)), 0);
        assert_eq!(loser_first.garbage_collect(&x(3)), 0);
        assert_eq!(winner_first.garbage_collect(&y(5)), 1);
        assert_eq!(loser_first.garbage_collect(&y(5)), 1);
        assert_eq!(winner_first.element_count(), loser_first.element_count());
    }

    #[test]
    fn every_loser_stamped_with_newest_member() {
        let (a, b, c) = (x(2), y(5), x(7));
        let orders = [[a, b, c], [a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]];
        for order in orders {
            let root = apply_sets(&order);
            assert_eq!(removal_stamps(&root, &[a, b, c]), vec![Some(c), Some(c), None]);
        }
    }

    #[test]
    fn add_on_object_is_type_mismatch() {
        let mut root = Root::new();
        let err = root
            .insert_after(&INITIAL_TICKET, &RgaList::head(), &prim(x(1), 1), &x(1))
            .unwrap_err();
        assert!(matches!(err, ApplyError::TypeMismatch { op: "add", .. }));
        assert_eq!(root.element_count(), 1);
    }

    #[test]
    fn failed_insert_leaves_root_unchanged() {
        let (mut root, list) = root_with_list();
        let before = root.element_count();
        let err = root.insert_after(&list, &x(99), &prim(x(2), 1), &x(2)).unwrap_err();
        assert_eq!(err, ApplyError::NotFound(x(99)));
        assert_eq!(root.element_count(), before);
        assert!(root.find_by_created_at(&x(2)).is_none());
    }

    #[test]
    fn remove_then_insert_after_tombstone() {
        let (mut root, list) = root_with_list();
        root.insert_after(&list, &RgaList::head(), &prim(x(2), 1), &x(2)).unwrap();
        assert!(root.remove(&list, &x(2), &x(3)).unwrap());
        root.insert_after(&list, &x(2), &prim(y(3), 2), &y(3)).unwrap();
        assert_eq!(root.view(), serde_json::json!({ "list": [2] }));
        assert_eq!(root.find_by_created_at(&x(2)).unwrap().created_at(), x(2));
    }

    #[test]
    fn remove_unlinked_child_is_not_found() {
        let (mut root, list) = root_with_list();
        assert_eq!(root.remove(&list, &x(7), &x(8)), Err(ApplyError::NotFound(x(7))));
    }

    #[test]
    fn move_records_moved_at() {
        let (mut root, list) = root_with_list();
        root.insert_after(&list, &RgaList::head(), &prim(x(2), 1), &x(2)).unwrap();
        root.insert_after(&list, &x(2), &prim(x(3), 2), &x(3)).unwrap();
        assert!(root.move_after(&list, &RgaList::head(), &x(3), &x(4)).unwrap());
        assert_eq!(root.view(), serde_json::json!({ "list": [2, 1] }));
        assert_eq!(root.find_by_created_at(&x(3)).unwrap().moved_at(), Some(x(4)));
    }

    #[test]
    fn garbage_collect_purges_subtree_and_unlinks() {
        let (mut root, list) = root_with_list();
        let inner = x(2);
        root.insert_after(&list, &RgaList::head(), &SimpleElement::new(inner, ElementValue::Object), &inner)
            .unwrap();
        root.set_member(&inner, "a", &prim(x(3), 1), &x(3)).unwrap();
        root.remove(&list, &inner, &x(4)).unwrap();

        assert_eq!(root.garbage_collect(&x(3)), 0);
        assert_eq!(root.garbage_collect(&x(4)), 2);
        assert!(root.find_by_created_at(&inner).is_none());
        assert!(root.find_by_created_at(&x(3)).is_none());
        let array = root.find_by_created_at(&list).unwrap().as_array().unwrap();
        assert_eq!(array.elements.node_count(), 0);
        assert_eq!(root.tombstone_count(), 0);
    }
}
