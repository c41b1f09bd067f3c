//! Raw data extraction and numeric conversion.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::chunked_read::read_chunked_data;
use crate::data_layout::DataLayout;
use crate::dataspace::Dataspace;
use crate::datatype::{CompoundMember, Datatype, DatatypeByteOrder};
use crate::error::FormatError;
use crate::filter_pipeline::FilterPipeline;
use crate::util::{ensure_fill_fits, ensure_len, to_index};

/// Read every element of a dataset as raw bytes in file byte order.
///
/// Storage that was never allocated reads as zeros.
pub fn read_raw_data(
    file_data: &[u8],
    layout: &DataLayout,
    dataspace: &Dataspace,
    datatype: &Datatype,
    pipeline: Option<&FilterPipeline>,
    offset_size: u8,
) -> Result<Vec<u8>, FormatError> {
    let element_size = datatype.type_size() as usize;
    let expected = to_index(dataspace.num_elements())?
        .checked_mul(element_size)
        .ok_or(FormatError::DatasetTooLarge {
            bytes: usize::MAX,
            limit: file_data.len(),
        })?;

    match layout {
        DataLayout::Compact { data } => {
            if data.len() < expected {
                return Err(FormatError::DataSizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
            Ok(data[..expected].to_vec())
        }
        DataLayout::Contiguous { address, size } => {
            let Some(address) = address else {
                ensure_fill_fits(expected, 0, file_data.len())?;
                return Ok(vec![0u8; expected]);
            };
            let size = to_index(*size)?;
            if size < expected {
                return Err(FormatError::DataSizeMismatch {
                    expected,
                    actual: size,
                });
            }
            let start = to_index(*address)?;
            ensure_len(file_data, start, expected)?;
            Ok(file_data[start..start + expected].to_vec())
        }
        DataLayout::Chunked {
            chunk_dimensions,
            btree_address,
        } => read_chunked_data(
            file_data,
            chunk_dimensions,
            *btree_address,
            dataspace,
            element_size,
            pipeline,
            offset_size,
        ),
    }
}

/// Slice one member's bytes out of a compound record.
pub fn compound_member_bytes<'a>(
    record: &'a [u8],
    member: &CompoundMember,
) -> Result<&'a [u8], FormatError> {
    let start = to_index(member.byte_offset)?;
    let len = member.datatype.type_size() as usize;
    ensure_len(record, start, len)?;
    Ok(&record[start..start + len])
}

/// Convert one integer or float element to `f64`.
pub fn element_as_f64(bytes: &[u8], datatype: &Datatype) -> Result<f64, FormatError> {
    match datatype {
        Datatype::FloatingPoint { size, byte_order } => {
            let size = *size as usize;
            ensure_len(bytes, 0, size)?;
            let b = &bytes[..size];
            match (size, byte_order) {
                (8, DatatypeByteOrder::LittleEndian) => Ok(LittleEndian::read_f64(b)),
                (8, DatatypeByteOrder::BigEndian) => Ok(BigEndian::read_f64(b)),
                (4, DatatypeByteOrder::LittleEndian) => Ok(LittleEndian::read_f32(b) as f64),
                (4, DatatypeByteOrder::BigEndian) => Ok(BigEndian::read_f32(b) as f64),
                (actual, _) => Err(FormatError::DataSizeMismatch {
                    expected: 8,
                    actual,
                }),
            }
        }
        Datatype::FixedPoint { .. } => element_as_i64(bytes, datatype).map(|v| v as f64),
        other => Err(FormatError::TypeMismatch {
            expected: "float",
            actual: other.class_name(),
        }),
    }
}

/// Convert one integer element to `i64`, sign-extending signed values.
///
/// Unsigned 64-bit values above `i64::MAX` wrap.
pub fn element_as_i64(bytes: &[u8], datatype: &Datatype) -> Result<i64, FormatError> {
    let Datatype::FixedPoint {
        size,
        byte_order,
        signed,
    } = datatype
    else {
        return Err(FormatError::TypeMismatch {
            expected: "integer",
            actual: datatype.class_name(),
        });
    };
    let size = *size as usize;
    if size == 0 || size > 8 {
        return Err(FormatError::DataSizeMismatch {
            expected: 8,
            actual: size,
        });
    }
    ensure_len(bytes, 0, size)?;
    let b = &bytes[..size];
    let raw = match byte_order {
        DatatypeByteOrder::LittleEndian => LittleEndian::read_uint(b, size),
        DatatypeByteOrder::BigEndian => BigEndian::read_uint(b, size),
    };
    let bits = size * 8;
    if *signed && bits < 64 && raw & (1 << (bits - 1)) != 0 {
        Ok((raw | (u64::MAX << bits)) as i64)
    } else {
        Ok(raw as i64)
    }
}

/// Convert a raw buffer of numeric elements to `f64`.
pub fn read_as_f64(raw: &[u8], datatype: &Datatype) -> Result<Vec<f64>, FormatError> {
    let size = datatype.type_size() as usize;
    if size == 0 {
        return Ok(Vec::new());
    }
    raw.chunks_exact(size)
        .map(|e| element_as_f64(e, datatype))
        .collect()
}

/// Convert a raw buffer of integer elements to `i64`.
pub fn read_as_i64(raw: &[u8], datatype: &Datatype) -> Result<Vec<i64>, FormatError> {
    let size = datatype.type_size() as usize;
    if size == 0 {
        return Ok(Vec::new());
    }
    raw.chunks_exact(size)
        .map(|e| element_as_i64(e, datatype))
        .collect()
}
