//! Logical time for the document model.
//!
//! Every event in a document (element creation, move, removal, text edit) is
//! stamped with a [`Ticket`]. Tickets are totally ordered and the order is the
//! same on every replica, which is what lets concurrent edits converge.
//!
//! - [`ActorId`] — fixed 12-byte replica identifier.
//! - [`Ticket`] — `(lamport, delimiter, actor)`.
//! - [`ChangeId`] — identity of one local change (one lamport tick).
//! - [`LogicalClock`] — per-actor ticket source with the Lamport merge rule.

use std::cmp::Ordering;
use std::fmt;

use rand::RngCore;
use thiserror::Error;

/// Length of an [`ActorId`] in bytes.
pub const ACTOR_ID_LEN: usize = 12;

// ── ActorId ────────────────────────────────────────────────────────────────

/// Identifier of an editing replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId([u8; ACTOR_ID_LEN]);

/// Error returned when parsing an [`ActorId`] from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorIdError {
    #[error("actor id must be {expected} hex chars, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("invalid hex digit {0:?} in actor id")]
    InvalidDigit(char),
}

impl ActorId {
    /// All zeros. Owner of [`INITIAL_TICKET`]; also the actor of a replica
    /// that has not been assigned an id yet.
    pub const INITIAL: ActorId = ActorId([0x00; ACTOR_ID_LEN]);
    /// All `0xff`. Owner of [`MAX_TICKET`].
    pub const MAX: ActorId = ActorId([0xff; ACTOR_ID_LEN]);

    pub const fn new(bytes: [u8; ACTOR_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// A random actor id.
    pub fn random() -> Self {
        let mut bytes = [0u8; ACTOR_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ACTOR_ID_LEN] {
        &self.0
    }

    /// Parse the 24-char lowercase/uppercase hex form.
    pub fn from_hex(s: &str) -> Result<Self, ActorIdError> {
        if s.len() != ACTOR_ID_LEN * 2 {
            return Err(ActorIdError::InvalidLength {
                expected: ACTOR_ID_LEN * 2,
                got: s.len(),
            });
        }
        let mut bytes = [0u8; ACTOR_ID_LEN];
        let mut chars = s.chars();
        for byte in bytes.iter_mut() {
            let hi = hex_value(chars.next())?;
            let lo = hex_value(chars.next())?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

fn hex_value(c: Option<char>) -> Result<u8, ActorIdError> {
    let c = c.ok_or(ActorIdError::InvalidLength {
        expected: ACTOR_ID_LEN * 2,
        got: 0,
    })?;
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or(ActorIdError::InvalidDigit(c))
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ── Ticket ─────────────────────────────────────────────────────────────────

/// An immutable logical timestamp: `(lamport, delimiter, actor)`.
///
/// Ordering compares `lamport`, then `delimiter`, then the actor bytes. Two
/// equal tickets always denote the same originating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    lamport: u64,
    delimiter: u32,
    actor_id: ActorId,
}

/// Bottom of the ticket order. Identity of the root object and of list heads.
pub const INITIAL_TICKET: Ticket = Ticket::new(0, 0, ActorId::INITIAL);

/// Top of the ticket order.
pub const MAX_TICKET: Ticket = Ticket::new(u64::MAX, u32::MAX, ActorId::MAX);

impl Ticket {
    pub const fn new(lamport: u64, delimiter: u32, actor_id: ActorId) -> Self {
        Self {
            lamport,
            delimiter,
            actor_id,
        }
    }

    pub const fn lamport(&self) -> u64 {
        self.lamport
    }

    pub const fn delimiter(&self) -> u32 {
        self.delimiter
    }

    pub const fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    /// Copy of this ticket carrying `actor_id`.
    #[must_use]
    pub const fn set_actor(&self, actor_id: ActorId) -> Ticket {
        Ticket::new(self.lamport, self.delimiter, actor_id)
    }

    /// Copy stamped with `actor_id` if this ticket was issued before an
    /// actor was assigned. [`INITIAL_TICKET`], the root and head anchor, is
    /// returned unchanged, as is any ticket of an assigned actor.
    #[must_use]
    pub fn assign_actor(&self, actor_id: ActorId) -> Ticket {
        if self.actor_id == ActorId::INITIAL && *self != INITIAL_TICKET {
            self.set_actor(actor_id)
        } else {
            *self
        }
    }

    /// `true` if this ticket sorts strictly after `other`.
    #[inline]
    pub fn after(&self, other: &Ticket) -> bool {
        self > other
    }
}

impl Ord for Ticket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lamport
            .cmp(&other.lamport)
            .then(self.delimiter.cmp(&other.delimiter))
            .then_with(|| self.actor_id.cmp(&other.actor_id))
    }
}

impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short actor suffix, like `12:3:..a1b2`.
        let hex = self.actor_id.to_hex();
        write!(f, "{}:{}:..{}", self.lamport, self.delimiter, &hex[hex.len() - 4..])
    }
}

// ── ChangeId ───────────────────────────────────────────────────────────────

/// Identity of a change: one local edit transaction.
///
/// All operations inside a change share the change's lamport value and are
/// told apart by their delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeId {
    pub client_seq: u32,
    pub lamport: u64,
    pub actor_id: ActorId,
}

impl ChangeId {
    pub const fn new(client_seq: u32, lamport: u64, actor_id: ActorId) -> Self {
        Self {
            client_seq,
            lamport,
            actor_id,
        }
    }

    /// Ticket of the operation with the given delimiter inside this change.
    pub const fn ticket(&self, delimiter: u32) -> Ticket {
        Ticket::new(self.lamport, delimiter, self.actor_id)
    }

    #[must_use]
    pub const fn set_actor(&self, actor_id: ActorId) -> ChangeId {
        ChangeId::new(self.client_seq, self.lamport, actor_id)
    }
}

// ── LogicalClock ───────────────────────────────────────────────────────────

/// A mutable per-actor Lamport clock.
///
/// `tick` opens a change, `next` stamps the events inside it, and `merge`
/// folds in tickets observed from other replicas.
#[derive(Debug, Clone)]
pub struct LogicalClock {
    actor_id: ActorId,
    lamport: u64,
    delimiter: u32,
    client_seq: u32,
}

impl LogicalClock {
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            lamport: 0,
            delimiter: 0,
            client_seq: 0,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn lamport(&self) -> u64 {
        self.lamport
    }

    pub fn client_seq(&self) -> u32 {
        self.client_seq
    }

    /// Re-stamp the clock with an assigned actor id.
    pub fn set_actor(&mut self, actor_id: ActorId) {
        self.actor_id = actor_id;
    }

    /// Start a new change: advance the lamport counter and reset the
    /// delimiter.
    pub fn tick(&mut self) -> ChangeId {
        self.lamport += 1;
        self.delimiter = 0;
        self.client_seq = self.client_seq.wrapping_add(1);
        ChangeId::new(self.client_seq, self.lamport, self.actor_id)
    }

    /// Issue the next ticket. Strictly greater than every ticket this clock
    /// issued before.
    pub fn next(&mut self) -> Ticket {
        if self.delimiter == u32::MAX {
            self.lamport += 1;
            self.delimiter = 0;
        }
        self.delimiter += 1;
        Ticket::new(self.lamport, self.delimiter, self.actor_id)
    }

    /// Lamport receive rule: `lamport = max(local, remote) + 1`.
    pub fn merge(&mut self, remote: &Ticket) {
        self.merge_lamport(remote.lamport());
    }

    pub fn merge_lamport(&mut self, remote_lamport: u64) {
        self.lamport = self.lamport.max(remote_lamport) + 1;
        self.delimiter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(n: u8) -> ActorId {
        let mut bytes = [0u8; ACTOR_ID_LEN];
        bytes[ACTOR_ID_LEN - 1] = n;
        ActorId::new(bytes)
    }

    #[test]
    fn compare_lamport_first() {
        let a = Ticket::new(2, 0, actor(1));
        let b = Ticket::new(1, 9, actor(9));
        assert!(a.after(&b));
        assert!(!b.after(&a));
    }

    #[test]
    fn compare_delimiter_then_actor() {
        let a = Ticket::new(1, 2, actor(1));
        let b = Ticket::new(1, 1, actor(9));
        assert!(a > b);
        let c = Ticket::new(1, 1, actor(2));
        let d = Ticket::new(1, 1, actor(1));
        assert!(c > d);
        assert_eq!(d.cmp(&d), Ordering::Equal);
    }

    #[test]
    fn initial_and_max_bound_everything() {
        let t = Ticket::new(5, 5, ActorId::random());
        assert!(INITIAL_TICKET < t);
        assert!(t < MAX_TICKET);
    }

    #[test]
    fn set_actor_returns_new_value() {
        let t = Ticket::new(3, 1, ActorId::INITIAL);
        let u = t.set_actor(actor(7));
        assert_eq!(t.actor_id(), ActorId::INITIAL);
        assert_eq!(u.actor_id(), actor(7));
        assert_eq!(u.lamport(), 3);
        assert_eq!(u.delimiter(), 1);
    }

    #[test]
    fn actor_hex_round_trip() {
        let a = ActorId::new([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xab, 0xff]);
        let hex = a.to_hex();
        assert_eq!(hex, "00010203040506070809abff");
        assert_eq!(ActorId::from_hex(&hex), Ok(a));
        assert!(matches!(
            ActorId::from_hex("abc"),
            Err(ActorIdError::InvalidLength { .. })
        ));
        assert_eq!(
            ActorId::from_hex("zz0102030405060708090aff"),
            Err(ActorIdError::InvalidDigit('z'))
        );
    }

    #[test]
    fn clock_next_is_strictly_increasing() {
        let mut clock = LogicalClock::new(actor(1));
        clock.tick();
        let t1 = clock.next();
        let t2 = clock.next();
        clock.tick();
        let t3 = clock.next();
        assert!(t1 < t2 && t2 < t3);
        assert_eq!(t3.delimiter(), 1);
    }

    #[test]
    fn clock_merge_takes_max_plus_one() {
        let mut clock = LogicalClock::new(actor(1));
        clock.tick();
        clock.merge(&Ticket::new(10, 4, actor(2)));
        assert_eq!(clock.lamport(), 11);
        clock.merge(&Ticket::new(3, 0, actor(2)));
        assert_eq!(clock.lamport(), 12);
    }

    #[test]
    fn change_id_tickets() {
        let mut clock = LogicalClock::new(actor(4));
        let id = clock.tick();
        assert_eq!(id.client_seq, 1);
        assert_eq!(id.ticket(2), Ticket::new(1, 2, actor(4)));
        assert_eq!(id.set_actor(actor(5)).actor_id, actor(5));
    }

    #[test]
    fn assign_actor_only_touches_unassigned_tickets() {
        let unassigned = Ticket::new(3, 2, ActorId::INITIAL);
        assert_eq!(unassigned.assign_actor(actor(6)), Ticket::new(3, 2, actor(6)));
        assert_eq!(INITIAL_TICKET.assign_actor(actor(6)), INITIAL_TICKET);
        let assigned = Ticket::new(3, 2, actor(1));
        assert_eq!(assigned.assign_actor(actor(6)), assigned);
    }
}
