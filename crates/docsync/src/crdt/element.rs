//! Element types of the document tree.
//!
//! | Rust type          | Semantics                               |
//! |--------------------|-----------------------------------------|
//! | `PrimitiveElement` | Immutable scalar value                  |
//! | `ObjectElement`    | LWW key→element map                     |
//! | `ArrayElement`     | RGA list of element references          |
//! | `TextElement`      | Split-RGA character sequence            |
//!
//! Containers never own their children. They hold the children's
//! `created_at` tickets, and the elements themselves live in the
//! [`ElementIndex`] owned by the [`Root`](super::root::Root).

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use super::rga::RgaList;
use super::rht::ElementRht;
use super::text::TextRga;
use crate::time::Ticket;

/// All elements of a document keyed by their `created_at` ticket.
pub type ElementIndex = HashMap<Ticket, Element>;

// ── Primitive ──────────────────────────────────────────────────────────────

/// A scalar value stored in a [`PrimitiveElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Milliseconds since the unix epoch.
    Date(i64),
}

impl Primitive {
    /// JSON view of this value. Bytes render as an array of numbers.
    pub fn to_json(&self) -> Value {
        match self {
            Primitive::Null => Value::Null,
            Primitive::Boolean(b) => Value::Bool(*b),
            Primitive::Integer(n) => Value::from(*n),
            Primitive::Long(n) => Value::from(*n),
            Primitive::Double(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Primitive::String(s) => Value::String(s.clone()),
            Primitive::Bytes(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
            Primitive::Date(ms) => Value::from(*ms),
        }
    }
}

impl From<bool> for Primitive {
    fn from(v: bool) -> Self {
        Primitive::Boolean(v)
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Primitive::Integer(v)
    }
}

impl From<i64> for Primitive {
    fn from(v: i64) -> Self {
        Primitive::Long(v)
    }
}

impl From<f64> for Primitive {
    fn from(v: f64) -> Self {
        Primitive::Double(v)
    }
}

impl From<&str> for Primitive {
    fn from(v: &str) -> Self {
        Primitive::String(v.to_string())
    }
}

impl From<String> for Primitive {
    fn from(v: String) -> Self {
        Primitive::String(v)
    }
}

impl From<Vec<u8>> for Primitive {
    fn from(v: Vec<u8>) -> Self {
        Primitive::Bytes(v)
    }
}

// ── ElementMeta ────────────────────────────────────────────────────────────

/// Identity and lifecycle tickets shared by every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementMeta {
    pub created_at: Ticket,
    pub moved_at: Option<Ticket>,
    pub removed_at: Option<Ticket>,
}

impl ElementMeta {
    pub fn new(created_at: Ticket) -> Self {
        Self {
            created_at,
            moved_at: None,
            removed_at: None,
        }
    }

    /// Logically delete. Takes effect only if `removed_at` is after the
    /// creation and after any earlier removal. Returns whether it did.
    pub fn remove(&mut self, removed_at: Ticket) -> bool {
        let after_creation = removed_at.after(&self.created_at);
        let after_removal = self.removed_at.map_or(true, |prev| removed_at.after(&prev));
        if after_creation && after_removal {
            self.removed_at = Some(removed_at);
            true
        } else {
            false
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Ticket that decides this element's place among concurrent siblings.
    pub fn positioned_at(&self) -> Ticket {
        self.moved_at.unwrap_or(self.created_at)
    }
}

// ── ElementKind ────────────────────────────────────────────────────────────

/// Discriminant of [`Element`], used in capability errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Primitive,
    Object,
    Array,
    Text,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Primitive => "primitive",
            ElementKind::Object => "object",
            ElementKind::Array => "array",
            ElementKind::Text => "text",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Concrete elements ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveElement {
    pub meta: ElementMeta,
    pub value: Primitive,
}

/// LWW map of keys to child elements.
#[derive(Debug, Clone)]
pub struct ObjectElement {
    pub meta: ElementMeta,
    pub members: ElementRht,
}

/// RGA list of child elements.
#[derive(Debug, Clone)]
pub struct ArrayElement {
    pub meta: ElementMeta,
    pub elements: RgaList,
}

/// Character sequence edited through `Edit` operations.
#[derive(Debug, Clone)]
pub struct TextElement {
    pub meta: ElementMeta,
    pub rga: TextRga,
}

impl ObjectElement {
    pub fn new(created_at: Ticket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            members: ElementRht::new(),
        }
    }

    /// Visible element stored under `key`.
    pub fn get<'a>(&self, key: &str, index: &'a ElementIndex) -> Option<&'a Element> {
        let id = self.members.get(key)?;
        index.get(&id).filter(|e| !e.is_removed())
    }

    /// Visible `(key, element)` pairs in key order.
    pub fn iter<'a>(&'a self, index: &'a ElementIndex) -> impl Iterator<Item = (&'a str, &'a Element)> + 'a {
        self.members.iter_keys().filter_map(move |(key, id)| {
            index
                .get(&id)
                .filter(|e| !e.is_removed())
                .map(|e| (key, e))
        })
    }

    /// Keys with a visible value, in order.
    pub fn keys(&self, index: &ElementIndex) -> Vec<String> {
        self.iter(index).map(|(k, _)| k.to_string()).collect()
    }
}

impl ArrayElement {
    pub fn new(created_at: Ticket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            elements: RgaList::new(),
        }
    }

    /// Visible elements in chain order.
    ///
    /// Lazy and restartable: calling it again walks the chain from the head.
    pub fn iter<'a>(&'a self, index: &'a ElementIndex) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements
            .iter()
            .filter_map(move |id| index.get(&id))
            .filter(|e| !e.is_removed())
    }

    pub fn len(&self, index: &ElementIndex) -> usize {
        self.iter(index).count()
    }

    pub fn is_empty(&self, index: &ElementIndex) -> bool {
        self.iter(index).next().is_none()
    }

    /// Visible element at position `idx`.
    pub fn get<'a>(&'a self, idx: usize, index: &'a ElementIndex) -> Option<&'a Element> {
        self.iter(index).nth(idx)
    }

    /// Identity of the visible element at position `idx`.
    pub fn created_at_at(&self, idx: usize, index: &ElementIndex) -> Option<Ticket> {
        self.get(idx, index).map(|e| e.created_at())
    }
}

impl TextElement {
    pub fn new(created_at: Ticket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            rga: TextRga::new(),
        }
    }
}

// ── Element ────────────────────────────────────────────────────────────────

/// A node of the document tree.
#[derive(Debug, Clone)]
pub enum Element {
    Primitive(PrimitiveElement),
    Object(ObjectElement),
    Array(ArrayElement),
    Text(TextElement),
}

impl Element {
    pub fn meta(&self) -> &ElementMeta {
        match self {
            Element::Primitive(e) => &e.meta,
            Element::Object(e) => &e.meta,
            Element::Array(e) => &e.meta,
            Element::Text(e) => &e.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ElementMeta {
        match self {
            Element::Primitive(e) => &mut e.meta,
            Element::Object(e) => &mut e.meta,
            Element::Array(e) => &mut e.meta,
            Element::Text(e) => &mut e.meta,
        }
    }

    pub fn created_at(&self) -> Ticket {
        self.meta().created_at
    }

    pub fn moved_at(&self) -> Option<Ticket> {
        self.meta().moved_at
    }

    pub fn removed_at(&self) -> Option<Ticket> {
        self.meta().removed_at
    }

    pub fn is_removed(&self) -> bool {
        self.meta().is_removed()
    }

    pub fn remove(&mut self, removed_at: Ticket) -> bool {
        self.meta_mut().remove(removed_at)
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Primitive(_) => ElementKind::Primitive,
            Element::Object(_) => ElementKind::Object,
            Element::Array(_) => ElementKind::Array,
            Element::Text(_) => ElementKind::Text,
        }
    }

    /// Tickets of every child linked from this element, removed ones included.
    pub fn child_tickets(&self) -> Vec<Ticket> {
        match self {
            Element::Object(o) => o.members.iter_members().collect(),
            Element::Array(a) => a.elements.iter().collect(),
            Element::Primitive(_) | Element::Text(_) => Vec::new(),
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Element::Primitive(p) => Some(&p.value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectElement> {
        match self {
            Element::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayElement> {
        match self {
            Element::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }

    /// JSON view of this element, resolving children from `index`.
    pub fn view(&self, index: &ElementIndex) -> Value {
        match self {
            Element::Primitive(p) => p.value.to_json(),
            Element::Object(o) => {
                let mut map = serde_json::Map::new();
                for (key, child) in o.iter(index) {
                    map.insert(key.to_string(), child.view(index));
                }
                Value::Object(map)
            }
            Element::Array(a) => Value::Array(a.iter(index).map(|e| e.view(index)).collect()),
            Element::Text(t) => Value::String(t.rga.to_string()),
        }
    }
}

// ── SimpleElement ──────────────────────────────────────────────────────────

/// Payload kinds an operation can create.
///
/// Containers always start empty; their content arrives through later
/// operations addressed at them.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Primitive(Primitive),
    Object,
    Array,
    Text,
}

impl From<Primitive> for ElementValue {
    fn from(p: Primitive) -> Self {
        ElementValue::Primitive(p)
    }
}

/// The element carried by `Set` and `Add` operations.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleElement {
    pub created_at: Ticket,
    pub value: ElementValue,
}

impl SimpleElement {
    pub fn new(created_at: Ticket, value: impl Into<ElementValue>) -> Self {
        Self {
            created_at,
            value: value.into(),
        }
    }

    /// Materialize a fresh tree element.
    pub fn to_element(&self) -> Element {
        match &self.value {
            ElementValue::Primitive(p) => Element::Primitive(PrimitiveElement {
                meta: ElementMeta::new(self.created_at),
                value: p.clone(),
            }),
            ElementValue::Object => Element::Object(ObjectElement::new(self.created_at)),
            ElementValue::Array => Element::Array(ArrayElement::new(self.created_at)),
            ElementValue::Text => Element::Text(TextElement::new(self.created_at)),
        }
    }

    /// See [`Ticket::assign_actor`].
    #[must_use]
    pub fn set_actor(&self, actor_id: crate::time::ActorId) -> SimpleElement {
        SimpleElement {
            created_at: self.created_at.assign_actor(actor_id),
            value: self.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{ActorId, Ticket};
    use serde_json::json;

    fn t(lamport: u64) -> Ticket {
        Ticket::new(lamport, 1, ActorId::new([1; 12]))
    }

    #[test]
    fn remove_requires_later_ticket() {
        let mut meta = ElementMeta::new(t(5));
        assert!(!meta.remove(t(4)));
        assert!(meta.remove(t(6)));
        assert!(!meta.remove(t(6)));
        assert!(meta.remove(t(8)));
        assert_eq!(meta.removed_at, Some(t(8)));
        assert_eq!(meta.created_at, t(5));
    }

    #[test]
    fn positioned_at_prefers_move() {
        let mut meta = ElementMeta::new(t(1));
        assert_eq!(meta.positioned_at(), t(1));
        meta.moved_at = Some(t(3));
        assert_eq!(meta.positioned_at(), t(3));
    }

    #[test]
    fn primitive_json_views() {
        assert_eq!(Primitive::Null.to_json(), json!(null));
        assert_eq!(Primitive::from(true).to_json(), json!(true));
        assert_eq!(Primitive::from(7i32).to_json(), json!(7));
        assert_eq!(Primitive::from(1.5f64).to_json(), json!(1.5));
        assert_eq!(Primitive::from("hi").to_json(), json!("hi"));
        assert_eq!(Primitive::Bytes(vec![1, 2]).to_json(), json!([1, 2]));
        assert_eq!(Primitive::Double(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn simple_element_materializes_kind() {
        let e = SimpleElement::new(t(2), ElementValue::Array).to_element();
        assert_eq!(e.kind(), ElementKind::Array);
        assert_eq!(e.created_at(), t(2));
        let p = SimpleElement::new(t(3), Primitive::from(1i32)).to_element();
        assert_eq!(p.as_primitive(), Some(&Primitive::Integer(1)));
    }
}
