//! Chunk filters: deflate, shuffle, fletcher32.
//!
//! Decoding runs the pipeline backwards. Bit `i` of a chunk's filter mask
//! means filter `i` was skipped when that chunk was written.

#[cfg(not(feature = "std"))]
use alloc::{string::ToString, vec::Vec};

use crate::error::FormatError;
use crate::filter_pipeline::{FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE};

/// Undo `pipeline` on one stored chunk.
pub fn decode_chunk(
    stored: &[u8],
    pipeline: &FilterPipeline,
    filter_mask: u32,
    element_size: usize,
) -> Result<Vec<u8>, FormatError> {
    let mut data = stored.to_vec();
    for (i, filter) in pipeline.filters.iter().enumerate().rev() {
        if i < 32 && filter_mask & (1 << i) != 0 {
            continue;
        }
        data = match filter.filter_id {
            FILTER_DEFLATE => inflate(&data)?,
            FILTER_SHUFFLE => unshuffle(&data, element_size),
            FILTER_FLETCHER32 => fletcher32_strip(&data)?,
            other => return Err(FormatError::UnsupportedFilter(other)),
        };
    }
    Ok(data)
}

/// Apply `pipeline` to one chunk, as a writer would.
#[cfg(any(test, feature = "fixture"))]
pub fn encode_chunk(
    raw: &[u8],
    pipeline: &FilterPipeline,
    element_size: usize,
) -> Result<Vec<u8>, FormatError> {
    let mut data = raw.to_vec();
    for filter in &pipeline.filters {
        data = match filter.filter_id {
            FILTER_DEFLATE => deflate(&data, filter.client_data.first().copied().unwrap_or(6))?,
            FILTER_SHUFFLE => shuffle(&data, element_size),
            FILTER_FLETCHER32 => {
                let mut out = data.clone();
                out.extend_from_slice(&fletcher32(&data).to_le_bytes());
                out
            }
            other => return Err(FormatError::UnsupportedFilter(other)),
        };
    }
    Ok(data)
}

#[cfg(feature = "deflate")]
fn inflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| FormatError::DecompressionError(e.to_string()))?;
    Ok(out)
}

#[cfg(not(feature = "deflate"))]
fn inflate(_data: &[u8]) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::UnsupportedFilter(FILTER_DEFLATE))
}

#[cfg(all(any(test, feature = "fixture"), feature = "deflate"))]
fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>, FormatError> {
    use std::io::Write;
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
    enc.write_all(data)
        .map_err(|e| FormatError::FilterError(e.to_string()))?;
    enc.finish().map_err(|e| FormatError::FilterError(e.to_string()))
}

#[cfg(all(any(test, feature = "fixture"), not(feature = "deflate")))]
fn deflate(_data: &[u8], _level: u32) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::UnsupportedFilter(FILTER_DEFLATE))
}

/// Stored layout: every element's byte 0, then every byte 1, and so on.
/// Trailing bytes that do not fill an element are left in place.
fn unshuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / element_size;
    let mut out = data.to_vec();
    for i in 0..n {
        for j in 0..element_size {
            out[i * element_size + j] = data[j * n + i];
        }
    }
    out
}

#[cfg(any(test, feature = "fixture"))]
fn shuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / element_size;
    let mut out = data.to_vec();
    for i in 0..n {
        for j in 0..element_size {
            out[j * n + i] = data[i * element_size + j];
        }
    }
    out
}

/// HDF5's Fletcher32: 16-bit big-endian words, odd trailing byte shifted high.
fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    let mut words = data.chunks_exact(2);
    for w in &mut words {
        sum1 = (sum1 + (((w[0] as u32) << 8) | w[1] as u32)) % 65535;
        sum2 = (sum2 + sum1) % 65535;
    }
    if let [last] = words.remainder() {
        sum1 = (sum1 + ((*last as u32) << 8)) % 65535;
        sum2 = (sum2 + sum1) % 65535;
    }
    (sum2 << 16) | sum1
}

fn fletcher32_strip(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    if data.len() < 4 {
        return Err(FormatError::FilterError(
            "fletcher32: chunk shorter than its checksum".to_string(),
        ));
    }
    let (payload, tail) = data.split_at(data.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = fletcher32(payload);
    if stored != computed {
        return Err(FormatError::Fletcher32Mismatch {
            expected: stored,
            computed,
        });
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_pipeline::FilterDescription;

    fn pipeline(ids: &[(u16, u32)]) -> FilterPipeline {
        FilterPipeline {
            filters: ids
                .iter()
                .map(|&(filter_id, value)| FilterDescription {
                    filter_id,
                    name: None,
                    flags: 0,
                    client_data: vec![value],
                })
                .collect(),
        }
    }

    #[test]
    fn shuffle_layout() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(shuffle(&data, 4), vec![1, 5, 2, 6, 3, 7, 4, 8]);
        assert_eq!(unshuffle(&[1, 5, 2, 6, 3, 7, 4, 8], 4), data.to_vec());
    }

    #[test]
    fn fletcher32_known_values() {
        assert_eq!(fletcher32(&[]), 0);
        // words 0x0102, 0x0304: sum1 = 0x0406, sum2 = 0x0102 + 0x0406
        assert_eq!(fletcher32(&[1, 2, 3, 4]), (0x0508 << 16) | 0x0406);
        // odd length: last byte is the high half of a word
        assert_eq!(fletcher32(&[1]), (0x0100 << 16) | 0x0100);
    }

    #[test]
    fn fletcher32_detects_corruption() {
        let pl = pipeline(&[(FILTER_FLETCHER32, 0)]);
        let mut stored = encode_chunk(&[9, 8, 7, 6, 5], &pl, 1).unwrap();
        assert_eq!(decode_chunk(&stored, &pl, 0, 1).unwrap(), vec![9, 8, 7, 6, 5]);
        stored[0] ^= 0xFF;
        assert!(matches!(
            decode_chunk(&stored, &pl, 0, 1),
            Err(FormatError::Fletcher32Mismatch { .. })
        ));
        assert!(decode_chunk(&[1, 2], &pl, 0, 1).is_err());
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn shuffle_then_deflate() {
        let values: Vec<u8> = (0..64u64).flat_map(|v| (v as f64).to_le_bytes()).collect();
        let pl = pipeline(&[(FILTER_SHUFFLE, 8), (FILTER_DEFLATE, 1)]);
        let stored = encode_chunk(&values, &pl, 8).unwrap();
        assert!(stored.len() < values.len());
        assert_eq!(decode_chunk(&stored, &pl, 0, 8).unwrap(), values);
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn filter_mask_skips_filters() {
        let values: Vec<u8> = (0..32u8).collect();
        let pl = pipeline(&[(FILTER_SHUFFLE, 4), (FILTER_DEFLATE, 6)]);
        // chunk written with deflate skipped (bit 1)
        let shuffled = shuffle(&values, 4);
        assert_eq!(decode_chunk(&shuffled, &pl, 0b10, 4).unwrap(), values);
        // every filter skipped
        assert_eq!(decode_chunk(&values, &pl, 0b11, 4).unwrap(), values);
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn corrupt_zlib_stream() {
        let pl = pipeline(&[(FILTER_DEFLATE, 6)]);
        assert!(matches!(
            decode_chunk(&[0x78, 0x9c, 0xFF, 0xFF, 0xFF], &pl, 0, 1),
            Err(FormatError::DecompressionError(_))
        ));
    }

    #[test]
    fn unknown_filter() {
        let pl = pipeline(&[(32001, 0)]);
        assert_eq!(
            decode_chunk(&[0; 4], &pl, 0, 1).unwrap_err(),
            FormatError::UnsupportedFilter(32001)
        );
    }
}
