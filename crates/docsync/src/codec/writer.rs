//! Big-endian byte writer with ticket encoding.

use crate::time::Ticket;

/// A growable output buffer.
///
/// All integers are written big-endian and fixed-width so two replicas
/// produce byte-identical encodings of the same ticket.
#[derive(Debug, Default)]
pub struct Writer {
    uint8: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            uint8: Vec::with_capacity(capacity),
        }
    }

    /// Take the bytes written so far, leaving the writer empty.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.uint8)
    }

    pub fn len(&self) -> usize {
        self.uint8.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uint8.is_empty()
    }

    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.uint8.push(val);
    }

    #[inline]
    pub fn u32(&mut self, val: u32) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    pub fn u64(&mut self, val: u64) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    pub fn i32(&mut self, val: i32) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    pub fn i64(&mut self, val: i64) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    pub fn f64(&mut self, val: f64) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Raw bytes, no length prefix.
    pub fn buf(&mut self, data: &[u8]) {
        self.uint8.extend_from_slice(data);
    }

    /// `u32` length prefix followed by the bytes.
    pub fn bytes(&mut self, data: &[u8]) {
        self.u32(data.len() as u32);
        self.buf(data);
    }

    /// `u32` byte length followed by UTF-8.
    pub fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    // ── Tickets ────────────────────────────────────────────────────────────

    /// `lamport u64 | delimiter u32 | actor [u8; 12]`
    pub fn ticket(&mut self, t: &Ticket) {
        self.u64(t.lamport());
        self.u32(t.delimiter());
        self.buf(t.actor_id().as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ActorId;

    #[test]
    fn ticket_layout() {
        let mut w = Writer::new();
        w.ticket(&Ticket::new(0x0102, 3, ActorId::new([0xaa; 12])));
        let out = w.flush();
        assert_eq!(out.len(), 24);
        assert_eq!(&out[..8], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&out[8..12], &[0, 0, 0, 3]);
        assert!(out[12..].iter().all(|b| *b == 0xaa));
        assert!(w.is_empty());
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut w = Writer::new();
        w.str("hé");
        assert_eq!(w.flush(), vec![0, 0, 0, 3, b'h', 0xc3, 0xa9]);
    }
}
