//! Bounds-checked big-endian reader, the inverse of [`Writer`](super::Writer).

use super::DecodeError;
use crate::time::{ActorId, Ticket, ACTOR_ID_LEN};

pub struct Reader<'a> {
    uint8: &'a [u8],
    x: usize,
}

impl<'a> Reader<'a> {
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Bytes left to read.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    pub fn position(&self) -> usize {
        self.x
    }

    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], DecodeError> {
        if self.size() < size {
            return Err(DecodeError::UnexpectedEof);
        }
        let bin = &self.uint8[self.x..self.x + size];
        self.x += size;
        Ok(bin)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.buf(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        self.array().map(u64::from_be_bytes)
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        self.array().map(i32::from_be_bytes)
    }

    pub fn i64(&mut self) -> Result<i64, DecodeError> {
        self.array().map(i64::from_be_bytes)
    }

    pub fn f64(&mut self) -> Result<f64, DecodeError> {
        self.array().map(f64::from_be_bytes)
    }

    /// `u32` length prefix followed by that many bytes.
    pub fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.u32()? as usize;
        self.buf(len)
    }

    pub fn str(&mut self) -> Result<String, DecodeError> {
        let at = self.x;
        let bin = self.bytes()?;
        std::str::from_utf8(bin)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8 { offset: at })
    }

    pub fn ticket(&mut self) -> Result<Ticket, DecodeError> {
        let lamport = self.u64()?;
        let delimiter = self.u32()?;
        let actor = self.array::<ACTOR_ID_LEN>()?;
        Ok(Ticket::new(lamport, delimiter, ActorId::new(actor)))
    }
}
