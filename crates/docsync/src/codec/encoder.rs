use super::tag;
use super::Writer;
use crate::crdt::{ElementValue, LatestByActor, Primitive, SimpleElement, TextPos};
use crate::operation::{Change, Operation};

pub struct Encoder {
    pub writer: Writer,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            writer: Writer::with_capacity(4 * 1024),
        }
    }

    pub fn flush(&mut self) -> Vec<u8> {
        self.writer.flush()
    }

    pub fn changes(&mut self, changes: &[Change]) {
        self.writer.u32(changes.len() as u32);
        for change in changes {
            self.change(change);
        }
    }

    pub fn change(&mut self, change: &Change) {
        let w = &mut self.writer;
        w.u32(change.id.client_seq);
        w.u64(change.id.lamport);
        w.buf(change.id.actor_id.as_bytes());
        match &change.message {
            None => w.u8(0),
            Some(m) => {
                w.u8(1);
                w.str(m);
            }
        }
        self.operations(&change.operations);
    }

    pub fn operations(&mut self, ops: &[Operation]) {
        self.writer.u32(ops.len() as u32);
        for op in ops {
            self.operation(op);
        }
    }

    pub fn operation(&mut self, op: &Operation) {
        match op {
            Operation::Set {
                parent_created_at,
                key,
                value,
                executed_at,
            } => {
                self.writer.u8(tag::SET);
                self.writer.ticket(parent_created_at);
                self.writer.str(key);
                self.element(value);
                self.writer.ticket(executed_at);
            }
            Operation::Add {
                parent_created_at,
                prev_created_at,
                value,
                executed_at,
            } => {
                self.writer.u8(tag::ADD);
                self.writer.ticket(parent_created_at);
                self.writer.ticket(prev_created_at);
                self.element(value);
                self.writer.ticket(executed_at);
            }
            Operation::Move {
                parent_created_at,
                prev_created_at,
                created_at,
                executed_at,
            } => {
                self.writer.u8(tag::MOVE);
                self.writer.ticket(parent_created_at);
                self.writer.ticket(prev_created_at);
                self.writer.ticket(created_at);
                self.writer.ticket(executed_at);
            }
            Operation::Remove {
                parent_created_at,
                created_at,
                executed_at,
            } => {
                self.writer.u8(tag::REMOVE);
                self.writer.ticket(parent_created_at);
                self.writer.ticket(created_at);
                self.writer.ticket(executed_at);
            }
            Operation::Edit {
                parent_created_at,
                from,
                to,
                latest_created_at_by_actor,
                content,
                executed_at,
            } => {
                self.writer.u8(tag::EDIT);
                self.writer.ticket(parent_created_at);
                self.text_pos(from);
                self.text_pos(to);
                self.latest(latest_created_at_by_actor.as_ref());
                self.writer.str(content);
                self.writer.ticket(executed_at);
            }
        }
    }

    fn element(&mut self, element: &SimpleElement) {
        let kind = match &element.value {
            ElementValue::Primitive(_) => tag::KIND_PRIMITIVE,
            ElementValue::Object => tag::KIND_OBJECT,
            ElementValue::Array => tag::KIND_ARRAY,
            ElementValue::Text => tag::KIND_TEXT,
        };
        self.writer.u8(kind);
        self.writer.ticket(&element.created_at);
        if let ElementValue::Primitive(p) = &element.value {
            self.primitive(p);
        }
    }

    fn primitive(&mut self, value: &Primitive) {
        let w = &mut self.writer;
        match value {
            Primitive::Null => w.u8(tag::NULL),
            Primitive::Boolean(b) => {
                w.u8(tag::BOOLEAN);
                w.u8(u8::from(*b));
            }
            Primitive::Integer(i) => {
                w.u8(tag::INTEGER);
                w.i32(*i);
            }
            Primitive::Long(l) => {
                w.u8(tag::LONG);
                w.i64(*l);
            }
            Primitive::Double(d) => {
                w.u8(tag::DOUBLE);
                w.f64(*d);
            }
            Primitive::String(s) => {
                w.u8(tag::STRING);
                w.str(s);
            }
            Primitive::Bytes(b) => {
                w.u8(tag::BYTES);
                w.bytes(b);
            }
            Primitive::Date(ms) => {
                w.u8(tag::DATE);
                w.i64(*ms);
            }
        }
    }

    fn text_pos(&mut self, pos: &TextPos) {
        self.writer.ticket(&pos.created_at);
        self.writer.u32(pos.offset);
    }

    fn latest(&mut self, latest: Option<&LatestByActor>) {
        let Some(latest) = latest else {
            self.writer.u32(tag::NO_LATEST);
            return;
        };
        self.writer.u32(latest.len() as u32);
        for (actor, ticket) in latest {
            self.writer.buf(actor.as_bytes());
            self.writer.ticket(ticket);
        }
    }
}
