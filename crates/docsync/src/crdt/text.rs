//! Split-RGA character sequence backing [`TextElement`].
//!
//! Same linear layout as [`RgaList`](super::rga::RgaList), except a node is
//! a *chunk*: the run of characters inserted by one edit. A chunk created at
//! ticket `T` holding `"abc"` owns the character positions `(T, 0)`,
//! `(T, 1)` and `(T, 2)`. Chunks are split whenever an edit boundary falls
//! inside one, so boundaries always sit between chunks.
//!
//! [`TextElement`]: super::element::TextElement

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ApplyError;
use crate::time::{ActorId, Ticket, INITIAL_TICKET, MAX_TICKET};

/// Per-actor latest `created_at` an editor had seen inside the edited range.
pub type LatestByActor = BTreeMap<ActorId, Ticket>;

// ── TextPos ────────────────────────────────────────────────────────────────

/// Identity of one character: the chunk's creation ticket plus the
/// character offset inside that insertion.
///
/// As an edit boundary, a `TextPos` means "right after this character".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextPos {
    pub created_at: Ticket,
    pub offset: u32,
}

impl TextPos {
    /// The position before the first character.
    pub const HEAD: TextPos = TextPos::new(INITIAL_TICKET, 0);

    pub const fn new(created_at: Ticket, offset: u32) -> Self {
        Self { created_at, offset }
    }
}

// ── TextChunk ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub id: TextPos,
    /// Kept after removal so offsets inside the chunk stay resolvable.
    pub content: String,
    pub removed_at: Option<Ticket>,
}

impl TextChunk {
    fn new(id: TextPos, content: String) -> Self {
        Self {
            id,
            content,
            removed_at: None,
        }
    }

    /// Number of characters.
    pub fn len(&self) -> u32 {
        self.content.chars().count() as u32
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    fn contains(&self, pos: &TextPos) -> bool {
        self.id.created_at == pos.created_at
            && self.id.offset <= pos.offset
            && pos.offset < self.id.offset + self.len()
    }

    /// Keep characters `[0, at)` here and return `[at, len)` as a new chunk.
    fn split(&mut self, at: u32) -> TextChunk {
        let byte_pos = self
            .content
            .char_indices()
            .nth(at as usize)
            .map_or(self.content.len(), |(i, _)| i);
        let right = self.content.split_off(byte_pos);
        TextChunk {
            id: TextPos::new(self.id.created_at, self.id.offset + at),
            content: right,
            removed_at: self.removed_at,
        }
    }
}

// ── TextRga ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TextRga {
    /// `chunks[0]` is an empty head chunk identified by [`TextPos::HEAD`].
    chunks: Vec<TextChunk>,
}

impl Default for TextRga {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRga {
    pub fn new() -> Self {
        Self {
            chunks: vec![TextChunk::new(TextPos::HEAD, String::new())],
        }
    }

    fn find_chunk(&self, pos: &TextPos) -> Option<usize> {
        if *pos == TextPos::HEAD {
            return Some(0);
        }
        self.chunks.iter().skip(1).position(|c| c.contains(pos)).map(|i| i + 1)
    }

    /// Split so that the character at `pos` ends its chunk.
    fn split_after(&mut self, pos: &TextPos) -> Result<(), ApplyError> {
        let idx = self
            .find_chunk(pos)
            .ok_or(ApplyError::NotFound(pos.created_at))?;
        if idx == 0 {
            return Ok(());
        }
        let cut = pos.offset - self.chunks[idx].id.offset + 1;
        if cut < self.chunks[idx].len() {
            let right = self.chunks[idx].split(cut);
            self.chunks.insert(idx + 1, right);
        }
        Ok(())
    }

    /// Index of the chunk after which the boundary `pos` lies, as seen by an
    /// edit stamped `executed_at`. Chunks created after `executed_at` right
    /// behind the boundary were concurrent with the edit and stay in front.
    fn boundary_index(&self, pos: &TextPos, executed_at: &Ticket) -> Result<usize, ApplyError> {
        let mut idx = self
            .find_chunk(pos)
            .ok_or(ApplyError::NotFound(pos.created_at))?;
        while idx + 1 < self.chunks.len() && self.chunks[idx + 1].id.created_at.after(executed_at) {
            idx += 1;
        }
        Ok(idx)
    }

    /// Replace the characters between `from` and `to` with `content`.
    ///
    /// A character in range is removed only if the editor had seen it:
    /// its `created_at` must not be after `latest[actor]`. `latest = None`
    /// means the editor saw everything (a local edit). Returns what this
    /// edit saw, per actor, for recording into the operation.
    pub fn edit(
        &mut self,
        from: &TextPos,
        to: &TextPos,
        content: &str,
        executed_at: &Ticket,
        latest: Option<&LatestByActor>,
    ) -> Result<LatestByActor, ApplyError> {
        for pos in [from, to] {
            if self.find_chunk(pos).is_none() {
                return Err(ApplyError::NotFound(pos.created_at));
            }
        }
        self.split_after(to)?;
        self.split_after(from)?;
        let from_idx = self.boundary_index(from, executed_at)?;
        let to_idx = self.boundary_index(to, executed_at)?;

        let mut seen = LatestByActor::new();
        if from_idx < to_idx {
            for chunk in &mut self.chunks[from_idx + 1..=to_idx] {
                let created_at = chunk.id.created_at;
                let actor = created_at.actor_id();
                let limit = match latest {
                    None => MAX_TICKET,
                    Some(map) => map.get(&actor).copied().unwrap_or(INITIAL_TICKET),
                };
                let known = !created_at.after(&limit);
                let newer_removal = chunk.removed_at.map_or(true, |r| executed_at.after(&r));
                if known && newer_removal {
                    chunk.removed_at = Some(*executed_at);
                }
                seen.entry(actor)
                    .and_modify(|t| {
                        if created_at.after(t) {
                            *t = created_at;
                        }
                    })
                    .or_insert(created_at);
            }
        }

        if !content.is_empty() {
            let chunk = TextChunk::new(TextPos::new(*executed_at, 0), content.to_string());
            self.chunks.insert(from_idx + 1, chunk);
        }
        Ok(seen)
    }

    /// Boundary position before the visible character `index`
    /// (`index == len()` addresses the end).
    pub fn pos_at(&self, index: usize) -> Option<TextPos> {
        if index == 0 {
            return Some(TextPos::HEAD);
        }
        let mut count = 0usize;
        for chunk in self.chunks.iter().skip(1).filter(|c| !c.is_removed()) {
            let len = chunk.len() as usize;
            if index <= count + len {
                let offset = (index - count - 1) as u32;
                return Some(TextPos::new(chunk.id.created_at, chunk.id.offset + offset));
            }
            count += len;
        }
        None
    }

    /// Number of visible characters.
    pub fn len(&self) -> usize {
        self.live_chunks().map(|c| c.len() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_chunks(&self) -> impl Iterator<Item = &TextChunk> {
        self.chunks.iter().skip(1).filter(|c| !c.is_removed())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len() - 1
    }

    /// Drop removed chunks whose removal is at or before `ticket`.
    pub fn purge(&mut self, ticket: &Ticket) -> usize {
        let before = self.chunks.len();
        let mut first = true;
        self.chunks.retain(|c| {
            let head = std::mem::take(&mut first);
            head || c.removed_at.map_or(true, |r| r.after(ticket))
        });
        before - self.chunks.len()
    }
}

impl fmt::Display for TextRga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.live_chunks() {
            f.write_str(&chunk.content)?;
        }
        Ok(())
    }
}
