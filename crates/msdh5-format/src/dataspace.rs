//! Dataspace message parsing (message type 0x0001).

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;
use crate::util::{ensure_len, read_uint};

/// Maximum-dimension value meaning "unlimited" (extendible arrays).
pub const UNLIMITED: u64 = u64::MAX;

/// Kind of dataspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    /// A single element.
    Scalar,
    /// An N-dimensional array.
    Simple,
    /// No elements at all.
    Null,
}

/// Parsed dataspace message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    /// Kind of dataspace.
    pub space_type: DataspaceType,
    /// Current dimension sizes (empty for scalar and null spaces).
    pub dimensions: Vec<u64>,
    /// Maximum dimension sizes, if stored.
    pub max_dimensions: Option<Vec<u64>>,
}

impl Dataspace {
    /// Parse a dataspace message body.
    pub fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, FormatError> {
        ensure_len(data, 0, 4)?;
        let version = data[0];
        let rank = data[1] as usize;
        let flags = data[2];

        let (space_type, mut pos) = match version {
            // v1: reserved(1) reserved(4)
            1 => {
                ensure_len(data, 0, 8)?;
                let st = if rank == 0 {
                    DataspaceType::Scalar
                } else {
                    DataspaceType::Simple
                };
                (st, 8)
            }
            2 => {
                let st = match data[3] {
                    0 => DataspaceType::Scalar,
                    1 => DataspaceType::Simple,
                    2 => DataspaceType::Null,
                    t => return Err(FormatError::InvalidDataspaceType(t)),
                };
                (st, 4)
            }
            v => return Err(FormatError::InvalidDataspaceVersion(v)),
        };

        let ls = length_size as usize;
        let read_dims = |pos: &mut usize| -> Result<Vec<u64>, FormatError> {
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push(read_uint(data, *pos, length_size)?);
                *pos += ls;
            }
            Ok(dims)
        };
        let dimensions = read_dims(&mut pos)?;
        let max_dimensions = if flags & 0x01 != 0 {
            Some(read_dims(&mut pos)?)
        } else {
            None
        };

        Ok(Dataspace {
            space_type,
            dimensions,
            max_dimensions,
        })
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Total number of elements.
    pub fn num_elements(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            DataspaceType::Scalar => 1,
            DataspaceType::Simple => self
                .dimensions
                .iter()
                .fold(1, |n, &d| n.saturating_mul(d)),
        }
    }

    /// Size of the first dimension (the row count of a table or array).
    pub fn rows(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            DataspaceType::Scalar => 1,
            DataspaceType::Simple => self.dimensions.first().copied().unwrap_or(0),
        }
    }
}
