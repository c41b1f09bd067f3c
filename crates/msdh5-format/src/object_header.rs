//! Version 1 object header parsing.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;
use crate::message_type::MessageType;
use crate::util::{ensure_len, read_u16, read_u32, read_uint, to_index};

/// Signature of version 2 object headers, which old-style files never contain.
const OHDR_SIGNATURE: [u8; 4] = [b'O', b'H', b'D', b'R'];

/// Must-understand bit in a message's flags byte.
const FLAG_MUST_UNDERSTAND: u8 = 0x08;

/// A single header message.
#[derive(Debug, Clone)]
pub struct HeaderMessage {
    /// The message type.
    pub msg_type: MessageType,
    /// Message flags byte.
    pub flags: u8,
    /// Raw message body.
    pub data: Vec<u8>,
}

/// Parsed object header, with continuation blocks already followed.
#[derive(Debug, Clone)]
pub struct ObjectHeader {
    /// Address the header was read from.
    pub address: u64,
    /// Hard link count.
    pub reference_count: u32,
    /// All non-NIL messages, in storage order.
    pub messages: Vec<HeaderMessage>,
}

impl ObjectHeader {
    /// Parse the object header at `offset`.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        // version(1) reserved(1) nmsgs(2) refcount(4) size(4), padded to 16
        ensure_len(data, offset, 16)?;
        if data[offset..offset + 4] == OHDR_SIGNATURE {
            return Err(FormatError::UnsupportedObjectHeaderVersion(2));
        }
        let version = data[offset];
        if version != 1 {
            return Err(FormatError::UnsupportedObjectHeaderVersion(version));
        }
        let num_messages = read_u16(data, offset + 2)? as usize;
        let reference_count = read_u32(data, offset + 4)?;
        let block_size = read_u32(data, offset + 8)? as usize;

        let mut walker = BlockWalker {
            data,
            offset_size,
            length_size,
            messages: Vec::with_capacity(num_messages),
            visited: Vec::new(),
        };
        walker.walk(offset + 16, block_size)?;

        Ok(ObjectHeader {
            address: offset as u64,
            reference_count,
            messages: walker.messages,
        })
    }

    /// First message of the given type.
    pub fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    /// Whether any message of the given type is present.
    pub fn has(&self, msg_type: MessageType) -> bool {
        self.find(msg_type).is_some()
    }
}

struct BlockWalker<'a> {
    data: &'a [u8],
    offset_size: u8,
    length_size: u8,
    messages: Vec<HeaderMessage>,
    visited: Vec<usize>,
}

impl BlockWalker<'_> {
    fn walk(&mut self, start: usize, size: usize) -> Result<(), FormatError> {
        if self.visited.contains(&start) {
            return Err(FormatError::ContinuationLoop(start as u64));
        }
        self.visited.push(start);
        ensure_len(self.data, start, size)?;

        let end = start + size;
        let mut pos = start;
        // type(2) size(2) flags(1) reserved(3)
        while pos + 8 <= end {
            let raw_type = read_u16(self.data, pos)?;
            let body_size = read_u16(self.data, pos + 2)? as usize;
            let flags = self.data[pos + 4];
            pos += 8;
            if pos + body_size > end {
                return Err(FormatError::UnexpectedEof {
                    expected: pos + body_size,
                    available: end,
                });
            }

            let msg_type = MessageType::from_u16(raw_type);
            if let MessageType::Unknown(id) = msg_type {
                if flags & FLAG_MUST_UNDERSTAND != 0 {
                    return Err(FormatError::UnsupportedMessage(id));
                }
            }
            let body = &self.data[pos..pos + body_size];
            pos += body_size;

            match msg_type {
                MessageType::Nil => {}
                MessageType::ObjectHeaderContinuation => {
                    let cont_addr = read_uint(body, 0, self.offset_size)?;
                    let cont_len =
                        read_uint(body, self.offset_size as usize, self.length_size)?;
                    let cont_start = to_index(cont_addr)?;
                    let cont_len = to_index(cont_len)?;
                    self.walk(cont_start, cont_len)?;
                }
                _ => self.messages.push(HeaderMessage {
                    msg_type,
                    flags,
                    data: body.to_vec(),
                }),
            }
        }
        Ok(())
    }
}
