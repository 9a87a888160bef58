//! Replicated hash table backing [`ObjectElement`].
//!
//! Each key points at the member with the greatest `created_at` ever set
//! under it. Every member, winner or loser, is also tracked by identity so a
//! `Remove` addressed by ticket can be validated against its parent.
//!
//! [`ObjectElement`]: super::element::ObjectElement

use std::collections::{BTreeMap, HashMap};

use crate::time::Ticket;

/// Result of [`ElementRht::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RhtSet {
    /// The new member now holds the key. `displaced` is the previous holder.
    Installed { displaced: Option<Ticket> },
    /// An existing holder is newer; the new member lost.
    Rejected { holder: Ticket },
}

#[derive(Debug, Clone, Default)]
pub struct ElementRht {
    by_key: BTreeMap<String, Ticket>,
    by_created_at: HashMap<Ticket, String>,
}

impl ElementRht {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `created_at` under `key`, last-writer-wins by ticket.
    ///
    /// The comparison is against the current holder whether or not that
    /// holder has been removed; visibility plays no part in who wins.
    pub fn set(&mut self, key: &str, created_at: Ticket) -> RhtSet {
        self.by_created_at.insert(created_at, key.to_string());
        match self.by_key.get(key).copied() {
            Some(holder) if !created_at.after(&holder) => RhtSet::Rejected { holder },
            displaced => {
                self.by_key.insert(key.to_string(), created_at);
                RhtSet::Installed { displaced }
            }
        }
    }

    /// Current holder of `key`, removed or not.
    pub fn get(&self, key: &str) -> Option<Ticket> {
        self.by_key.get(key).copied()
    }

    /// Key a member was set under.
    pub fn key_of(&self, created_at: &Ticket) -> Option<&str> {
        self.by_created_at.get(created_at).map(String::as_str)
    }

    pub fn contains(&self, created_at: &Ticket) -> bool {
        self.by_created_at.contains_key(created_at)
    }

    /// `(key, holder)` pairs in key order.
    pub fn iter_keys(&self) -> impl Iterator<Item = (&str, Ticket)> + '_ {
        self.by_key.iter().map(|(k, t)| (k.as_str(), *t))
    }

    /// Members set under `key` that were created before `created_at`.
    pub fn members_before<'a>(&'a self, key: &'a str, created_at: &'a Ticket) -> impl Iterator<Item = Ticket> + 'a {
        self.by_created_at
            .iter()
            .filter(move |(t, k)| k.as_str() == key && created_at.after(t))
            .map(|(t, _)| *t)
    }

    /// Every member ever set, losers included.
    pub fn iter_members(&self) -> impl Iterator<Item = Ticket> + '_ {
        self.by_created_at.keys().copied()
    }

    /// Forget a purged member. If it still held its key, the key goes too.
    pub fn purge(&mut self, created_at: &Ticket) -> bool {
        let Some(key) = self.by_created_at.remove(created_at) else {
            return false;
        };
        if self.by_key.get(&key) == Some(created_at) {
            self.by_key.remove(&key);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.by_created_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_created_at.is_empty()
    }
}
