//! Datatype message parsing (message type 0x0003).
//!
//! Covers the classes song files use: fixed-point, floating-point, fixed-length
//! strings and the compound type of each group's `songs` table, plus arrays
//! nested inside compounds.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use crate::error::FormatError;
use crate::util::{ensure_len, read_u32, read_uint};

/// Byte order of numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatatypeByteOrder {
    LittleEndian,
    BigEndian,
}

/// How a fixed-length string fills its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    /// NUL-terminated, garbage after the terminator.
    NullTerminate,
    /// Padded with NULs, no terminator when full.
    NullPad,
    /// Padded with spaces.
    SpacePad,
}

/// Character set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

/// A member of a compound datatype.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMember {
    /// Member name.
    pub name: String,
    /// Byte offset inside one compound element.
    pub byte_offset: u64,
    /// Member datatype.
    pub datatype: Datatype,
}

/// Parsed datatype.
#[derive(Debug, Clone, PartialEq)]
pub enum Datatype {
    /// Class 0: integers.
    FixedPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        signed: bool,
    },
    /// Class 1: IEEE floats.
    FloatingPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
    },
    /// Class 3: fixed-length strings.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 6: compound records.
    Compound {
        size: u32,
        members: Vec<CompoundMember>,
    },
    /// Class 10: fixed-size arrays of a base type.
    Array {
        base_type: Box<Datatype>,
        dimensions: Vec<u32>,
    },
}

fn parse_string_padding(val: u8) -> Result<StringPadding, FormatError> {
    match val {
        0 => Ok(StringPadding::NullTerminate),
        1 => Ok(StringPadding::NullPad),
        2 => Ok(StringPadding::SpacePad),
        _ => Err(FormatError::InvalidStringPadding(val)),
    }
}

fn parse_charset(val: u8) -> Result<CharacterSet, FormatError> {
    match val {
        0 => Ok(CharacterSet::Ascii),
        1 => Ok(CharacterSet::Utf8),
        _ => Err(FormatError::InvalidCharacterSet(val)),
    }
}

/// Read a NUL-terminated name; returns (name, bytes consumed with the NUL).
fn read_name(data: &[u8], offset: usize) -> Result<(String, usize), FormatError> {
    ensure_len(data, offset, 1)?;
    let len = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(FormatError::UnexpectedEof {
            expected: data.len() + 1,
            available: data.len(),
        })?;
    let name = String::from_utf8_lossy(&data[offset..offset + len]).into_owned();
    Ok((name, len + 1))
}

/// Width of member offsets in version 3 compounds.
fn offset_width(compound_size: u32) -> u8 {
    match compound_size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

fn read_member_offset(data: &[u8], pos: usize, width: u8) -> Result<u64, FormatError> {
    if width == 3 {
        ensure_len(data, pos, 3)?;
        Ok(data[pos] as u64 | (data[pos + 1] as u64) << 8 | (data[pos + 2] as u64) << 16)
    } else {
        read_uint(data, pos, width)
    }
}

impl Datatype {
    /// Parse a datatype; returns the type and the number of bytes it occupied.
    pub fn parse(data: &[u8]) -> Result<(Datatype, usize), FormatError> {
        ensure_len(data, 0, 8)?;
        let class_id = data[0] & 0x0F;
        let version = data[0] >> 4;
        let bf0 = data[1];
        let bf1 = data[2];
        let size = read_u32(data, 4)?;
        let mut pos = 8;

        match class_id {
            0 => {
                // bit offset(2) precision(2)
                ensure_len(data, pos, 4)?;
                pos += 4;
                Ok((
                    Datatype::FixedPoint {
                        size,
                        byte_order: byte_order(bf0),
                        signed: bf0 & 0x08 != 0,
                    },
                    pos,
                ))
            }
            1 => {
                // bit offset(2) precision(2) exp loc/size, mantissa loc/size, bias(4)
                ensure_len(data, pos, 12)?;
                pos += 12;
                Ok((
                    Datatype::FloatingPoint {
                        size,
                        byte_order: byte_order(bf0),
                    },
                    pos,
                ))
            }
            3 => Ok((
                Datatype::String {
                    size,
                    padding: parse_string_padding(bf0 & 0x0F)?,
                    charset: parse_charset(bf0 >> 4)?,
                },
                pos,
            )),
            6 => {
                let count = (bf0 as usize) | ((bf1 as usize) << 8);
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let (name, name_len) = read_name(data, pos)?;
                    let byte_offset = match version {
                        1 => {
                            // name padded to 8, offset(4) rank(1) reserved(3)
                            // permutation(4) reserved(4) dims(16)
                            pos += (name_len + 7) & !7;
                            let off = read_u32(data, pos)? as u64;
                            ensure_len(data, pos, 32)?;
                            pos += 32;
                            off
                        }
                        2 => {
                            pos += (name_len + 7) & !7;
                            let off = read_u32(data, pos)? as u64;
                            pos += 4;
                            off
                        }
                        3 => {
                            pos += name_len;
                            let width = offset_width(size);
                            let off = read_member_offset(data, pos, width)?;
                            pos += width as usize;
                            off
                        }
                        v => {
                            return Err(FormatError::InvalidDatatypeVersion {
                                class: class_id,
                                version: v,
                            })
                        }
                    };
                    ensure_len(data, pos, 8)?;
                    let (datatype, consumed) = Datatype::parse(&data[pos..])?;
                    pos += consumed;
                    members.push(CompoundMember {
                        name,
                        byte_offset,
                        datatype,
                    });
                }
                Ok((Datatype::Compound { size, members }, pos))
            }
            10 => {
                ensure_len(data, pos, 1)?;
                let rank = data[pos] as usize;
                pos += 1;
                match version {
                    // reserved(3), dims, permutation indices
                    2 => pos += 3,
                    3 => {}
                    v => {
                        return Err(FormatError::InvalidDatatypeVersion {
                            class: class_id,
                            version: v,
                        })
                    }
                }
                let mut dimensions = Vec::with_capacity(rank);
                for _ in 0..rank {
                    dimensions.push(read_u32(data, pos)?);
                    pos += 4;
                }
                if version == 2 {
                    ensure_len(data, pos, 4 * rank)?;
                    pos += 4 * rank;
                }
                ensure_len(data, pos, 8)?;
                let (base, consumed) = Datatype::parse(&data[pos..])?;
                pos += consumed;
                Ok((
                    Datatype::Array {
                        base_type: Box::new(base),
                        dimensions,
                    },
                    pos,
                ))
            }
            other => Err(FormatError::UnsupportedDatatypeClass(other)),
        }
    }

    /// Size in bytes of one element.
    pub fn type_size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size, .. }
            | Datatype::Compound { size, .. } => *size,
            Datatype::Array {
                base_type,
                dimensions,
            } => dimensions.iter().product::<u32>() * base_type.type_size(),
        }
    }

    /// Short class name for diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            Datatype::FixedPoint { .. } => "integer",
            Datatype::FloatingPoint { .. } => "float",
            Datatype::String { .. } => "string",
            Datatype::Compound { .. } => "compound",
            Datatype::Array { .. } => "array",
        }
    }

    /// Find a compound member by name.
    pub fn member(&self, name: &str) -> Option<&CompoundMember> {
        match self {
            Datatype::Compound { members, .. } => members.iter().find(|m| m.name == name),
            _ => None,
        }
    }
}

fn byte_order(bf0: u8) -> DatatypeByteOrder {
    if bf0 & 0x01 == 0 {
        DatatypeByteOrder::LittleEndian
    } else {
        DatatypeByteOrder::BigEndian
    }
}
