//! Bounds-checked little-endian field readers shared by the structure parsers.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Fail with `UnexpectedEof` unless `data[offset..offset + needed]` exists.
pub(crate) fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), FormatError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(FormatError::UnexpectedEof {
            expected: offset.saturating_add(needed),
            available: data.len(),
        }),
    }
}

/// Read an unsigned little-endian integer of `size` bytes (1, 2, 4 or 8).
pub(crate) fn read_uint(data: &[u8], pos: usize, size: u8) -> Result<u64, FormatError> {
    let s = size as usize;
    ensure_len(data, pos, s)?;
    let slice = &data[pos..pos + s];
    Ok(match size {
        1 => slice[0] as u64,
        2 => LittleEndian::read_u16(slice) as u64,
        4 => LittleEndian::read_u32(slice) as u64,
        8 => LittleEndian::read_u64(slice),
        _ => return Err(FormatError::InvalidOffsetSize(size)),
    })
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, FormatError> {
    ensure_len(data, pos, 2)?;
    Ok(LittleEndian::read_u16(&data[pos..pos + 2]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, FormatError> {
    ensure_len(data, pos, 4)?;
    Ok(LittleEndian::read_u32(&data[pos..pos + 4]))
}

/// An address field whose bytes are all 0xFF is the "undefined address".
pub(crate) fn read_address(data: &[u8], pos: usize, size: u8) -> Result<Option<u64>, FormatError> {
    ensure_len(data, pos, size as usize)?;
    if data[pos..pos + size as usize].iter().all(|&b| b == 0xFF) {
        Ok(None)
    } else {
        read_uint(data, pos, size).map(Some)
    }
}

/// Convert a file address or length to a slice index.
pub(crate) fn to_index(addr: u64) -> Result<usize, FormatError> {
    usize::try_from(addr).map_err(|_| FormatError::AddressOverflow(addr))
}

/// Zero-filled output a read may allocate beyond what its storage backs.
const FILL_FLOOR: usize = 1 << 20;

/// Fail with `DatasetTooLarge` unless a `bytes`-long output buffer is
/// accounted for: by `backed` bytes of stored data, by the file length, or by
/// [`FILL_FLOOR`].
pub(crate) fn ensure_fill_fits(bytes: usize, backed: usize, file_len: usize) -> Result<(), FormatError> {
    let limit = backed.max(file_len).max(FILL_FLOOR);
    if bytes > limit {
        return Err(FormatError::DatasetTooLarge { bytes, limit });
    }
    Ok(())
}
