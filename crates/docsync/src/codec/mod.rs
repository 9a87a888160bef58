//! Binary wire format for operations and changes.
//!
//! ```text
//! ticket     := lamport u64 | delimiter u32 | actor [u8; 12]
//! string     := len u32 | utf8
//! element    := kind u8 | created_at ticket | [primitive]
//! primitive  := tag u8 | payload
//! text_pos   := ticket | offset u32
//! operation  := tag u8 | body
//! operations := count u32 | operation*
//! change     := client_seq u32 | lamport u64 | actor | (0x00 | 0x01 string) | operations
//! changes    := count u32 | change*
//! ```
//!
//! All integers are big-endian.

mod decoder;
mod encoder;
mod reader;
mod writer;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

use crate::operation::{Change, Operation};

pub(crate) mod tag {
    pub const SET: u8 = 1;
    pub const ADD: u8 = 2;
    pub const MOVE: u8 = 3;
    pub const REMOVE: u8 = 4;
    pub const EDIT: u8 = 5;

    pub const KIND_PRIMITIVE: u8 = 1;
    pub const KIND_OBJECT: u8 = 2;
    pub const KIND_ARRAY: u8 = 3;
    pub const KIND_TEXT: u8 = 4;

    pub const NULL: u8 = 0;
    pub const BOOLEAN: u8 = 1;
    pub const INTEGER: u8 = 2;
    pub const LONG: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const STRING: u8 = 5;
    pub const BYTES: u8 = 6;
    pub const DATE: u8 = 7;

    /// Edit carrying no per-actor map.
    pub const NO_LATEST: u32 = u32::MAX;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown operation tag {0}")]
    UnknownOperationTag(u8),
    #[error("unknown element kind {0}")]
    UnknownElementKind(u8),
    #[error("unknown primitive tag {0}")]
    UnknownPrimitiveTag(u8),
    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

pub fn encode_operations(ops: &[Operation]) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.operations(ops);
    encoder.flush()
}

pub fn decode_operations(data: &[u8]) -> Result<Vec<Operation>, DecodeError> {
    Decoder::new(data).finish(|d| d.operations())
}

pub fn encode_changes(changes: &[Change]) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.changes(changes);
    encoder.flush()
}

pub fn decode_changes(data: &[u8]) -> Result<Vec<Change>, DecodeError> {
    Decoder::new(data).finish(|d| d.changes())
}
