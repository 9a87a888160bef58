use super::tag;
use super::{DecodeError, Reader};
use crate::crdt::{ElementValue, LatestByActor, Primitive, SimpleElement, TextPos};
use crate::operation::{Change, Operation};
use crate::time::{ActorId, ChangeId, ACTOR_ID_LEN};

pub struct Decoder<'a> {
    reader: Reader<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(data),
        }
    }

    /// Run `f` and require that it consumed the whole input.
    pub fn finish<T>(
        mut self,
        f: impl FnOnce(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        let out = f(&mut self)?;
        match self.reader.size() {
            0 => Ok(out),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    pub fn changes(&mut self) -> Result<Vec<Change>, DecodeError> {
        let count = self.reader.u32()?;
        let mut changes = Vec::new();
        for _ in 0..count {
            changes.push(self.change()?);
        }
        Ok(changes)
    }

    pub fn change(&mut self) -> Result<Change, DecodeError> {
        let client_seq = self.reader.u32()?;
        let lamport = self.reader.u64()?;
        let actor = self.actor()?;
        let message = match self.reader.u8()? {
            0 => None,
            _ => Some(self.reader.str()?),
        };
        let operations = self.operations()?;
        Ok(Change::new(
            ChangeId::new(client_seq, lamport, actor),
            message,
            operations,
        ))
    }

    pub fn operations(&mut self) -> Result<Vec<Operation>, DecodeError> {
        let count = self.reader.u32()?;
        // Capacity is bounded by what the input could possibly hold.
        let mut ops = Vec::with_capacity((count as usize).min(self.reader.size()));
        for _ in 0..count {
            ops.push(self.operation()?);
        }
        Ok(ops)
    }

    pub fn operation(&mut self) -> Result<Operation, DecodeError> {
        let r = &mut self.reader;
        let op = match r.u8()? {
            tag::SET => {
                let parent_created_at = r.ticket()?;
                let key = r.str()?;
                let value = self.element()?;
                let executed_at = self.reader.ticket()?;
                Operation::Set {
                    parent_created_at,
                    key,
                    value,
                    executed_at,
                }
            }
            tag::ADD => {
                let parent_created_at = r.ticket()?;
                let prev_created_at = r.ticket()?;
                let value = self.element()?;
                let executed_at = self.reader.ticket()?;
                Operation::Add {
                    parent_created_at,
                    prev_created_at,
                    value,
                    executed_at,
                }
            }
            tag::MOVE => Operation::Move {
                parent_created_at: r.ticket()?,
                prev_created_at: r.ticket()?,
                created_at: r.ticket()?,
                executed_at: r.ticket()?,
            },
            tag::REMOVE => Operation::Remove {
                parent_created_at: r.ticket()?,
                created_at: r.ticket()?,
                executed_at: r.ticket()?,
            },
            tag::EDIT => {
                let parent_created_at = r.ticket()?;
                let from = self.text_pos()?;
                let to = self.text_pos()?;
                let latest_created_at_by_actor = self.latest()?;
                let content = self.reader.str()?;
                let executed_at = self.reader.ticket()?;
                Operation::Edit {
                    parent_created_at,
                    from,
                    to,
                    latest_created_at_by_actor,
                    content,
                    executed_at,
                }
            }
            other => return Err(DecodeError::UnknownOperationTag(other)),
        };
        Ok(op)
    }

    fn actor(&mut self) -> Result<ActorId, DecodeError> {
        let mut bytes = [0u8; ACTOR_ID_LEN];
        bytes.copy_from_slice(self.reader.buf(ACTOR_ID_LEN)?);
        Ok(ActorId::new(bytes))
    }

    fn element(&mut self) -> Result<SimpleElement, DecodeError> {
        let kind = self.reader.u8()?;
        if !matches!(
            kind,
            tag::KIND_PRIMITIVE | tag::KIND_OBJECT | tag::KIND_ARRAY | tag::KIND_TEXT
        ) {
            return Err(DecodeError::UnknownElementKind(kind));
        }
        let created_at = self.reader.ticket()?;
        let value = match kind {
            tag::KIND_PRIMITIVE => ElementValue::Primitive(self.primitive()?),
            tag::KIND_OBJECT => ElementValue::Object,
            tag::KIND_ARRAY => ElementValue::Array,
            _ => ElementValue::Text,
        };
        Ok(SimpleElement::new(created_at, value))
    }

    fn primitive(&mut self) -> Result<Primitive, DecodeError> {
        let r = &mut self.reader;
        Ok(match r.u8()? {
            tag::NULL => Primitive::Null,
            tag::BOOLEAN => Primitive::Boolean(r.u8()? != 0),
            tag::INTEGER => Primitive::Integer(r.i32()?),
            tag::LONG => Primitive::Long(r.i64()?),
            tag::DOUBLE => Primitive::Double(r.f64()?),
            tag::STRING => Primitive::String(r.str()?),
            tag::BYTES => Primitive::Bytes(r.bytes()?.to_vec()),
            tag::DATE => Primitive::Date(r.i64()?),
            other => return Err(DecodeError::UnknownPrimitiveTag(other)),
        })
    }

    fn text_pos(&mut self) -> Result<TextPos, DecodeError> {
        let created_at = self.reader.ticket()?;
        let offset = self.reader.u32()?;
        Ok(TextPos::new(created_at, offset))
    }

    fn latest(&mut self) -> Result<Option<LatestByActor>, DecodeError> {
        let count = self.reader.u32()?;
        if count == tag::NO_LATEST {
            return Ok(None);
        }
        let mut latest = LatestByActor::new();
        for _ in 0..count {
            let actor = self.actor()?;
            let ticket = self.reader.ticket()?;
            latest.insert(actor, ticket);
        }
        Ok(Some(latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_operations, encode_operations};
    use crate::time::{Ticket, INITIAL_TICKET};

    #[test]
    fn unknown_tag() {
        let data = [0, 0, 0, 1, 9];
        assert_eq!(decode_operations(&data), Err(DecodeError::UnknownOperationTag(9)));
    }

    #[test]
    fn trailing_bytes() {
        let op = Operation::Remove {
            parent_created_at: INITIAL_TICKET,
            created_at: Ticket::new(1, 1, ActorId::new([1; 12])),
            executed_at: Ticket::new(2, 1, ActorId::new([1; 12])),
        };
        let mut data = encode_operations(&[op]);
        data.push(0);
        assert_eq!(decode_operations(&data), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn unknown_element_kind() {
        let mut data = vec![0, 0, 0, 1, tag::ADD];
        data.extend_from_slice(&[0u8; 48]);
        data.push(0x7f);
        assert_eq!(decode_operations(&data), Err(DecodeError::UnknownElementKind(0x7f)));
    }

    #[test]
    fn unknown_element_kind_checked_before_its_ticket() {
        let mut data = vec![0, 0, 0, 1, tag::SET];
        data.extend_from_slice(&[0u8; 24]);
        data.extend_from_slice(&[0, 0, 0, 1, b'k']);
        data.push(0x09);
        assert_eq!(decode_operations(&data), Err(DecodeError::UnknownElementKind(0x09)));
    }
}
