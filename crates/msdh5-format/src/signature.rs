//! HDF5 format signature detection.

use crate::error::FormatError;

/// The 8-byte HDF5 magic signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// Locate the superblock.
///
/// The signature sits at offset 0 or at a power of two from 512 upward, which
/// is where a user block pushes it.
pub fn find_signature(data: &[u8]) -> Result<usize, FormatError> {
    let mut offset = 0usize;
    while offset + HDF5_SIGNATURE.len() <= data.len() {
        if data[offset..offset + HDF5_SIGNATURE.len()] == HDF5_SIGNATURE {
            return Ok(offset);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Err(FormatError::SignatureNotFound)
}
