#![allow(dead_code)]

use docsync::crdt::RgaList;
use docsync::{ActorId, ElementValue, Operation, Primitive, SimpleElement, Ticket, INITIAL_TICKET};

pub fn actor(n: u8) -> ActorId {
    ActorId::new([n; 12])
}

pub fn ticket(lamport: u64, delimiter: u32, actor_n: u8) -> Ticket {
    Ticket::new(lamport, delimiter, actor(actor_n))
}

pub fn head() -> Ticket {
    RgaList::head()
}

pub fn set(parent: Ticket, key: &str, value: impl Into<ElementValue>, at: Ticket) -> Operation {
    Operation::Set {
        parent_created_at: parent,
        key: key.to_string(),
        value: SimpleElement::new(at, value),
        executed_at: at,
    }
}

pub fn set_root(key: &str, value: impl Into<ElementValue>, at: Ticket) -> Operation {
    set(INITIAL_TICKET, key, value, at)
}

pub fn add(list: Ticket, prev: Ticket, value: &str, at: Ticket) -> Operation {
    Operation::Add {
        parent_created_at: list,
        prev_created_at: prev,
        value: SimpleElement::new(at, Primitive::from(value)),
        executed_at: at,
    }
}

pub fn remove(parent: Ticket, target: Ticket, at: Ticket) -> Operation {
    Operation::Remove {
        parent_created_at: parent,
        created_at: target,
        executed_at: at,
    }
}

pub fn mv(list: Ticket, prev: Ticket, target: Ticket, at: Ticket) -> Operation {
    Operation::Move {
        parent_created_at: list,
        prev_created_at: prev,
        created_at: target,
        executed_at: at,
    }
}
