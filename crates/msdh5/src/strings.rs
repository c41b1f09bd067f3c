//! Fixed-width string handling for scalar string fields and packed string arrays.

use msdh5_format::datatype::StringPadding;

/// Payload of one stored slot: up to the first NUL, without trailing spaces
/// for space-padded types.
fn slot_payload(slot: &[u8], padding: StringPadding) -> &[u8] {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    let mut payload = &slot[..end];
    if padding == StringPadding::SpacePad {
        while let [rest @ .., b' '] = payload {
            payload = rest;
        }
    }
    payload
}

/// Drop a multibyte sequence left incomplete at the end of `bytes`.
fn whole_chars(bytes: &[u8]) -> &[u8] {
    let start = bytes.len().saturating_sub(4);
    let Some(lead) = bytes[start..].iter().rposition(|&b| b & 0xC0 != 0x80) else {
        return bytes;
    };
    let lead = start + lead;
    match core::str::from_utf8(&bytes[lead..]) {
        Err(e) if e.error_len().is_none() => &bytes[..lead],
        _ => bytes,
    }
}

/// Decode a scalar string member, keeping the whole characters that fit in
/// `buffer_width` bytes. Invalid bytes decode as U+FFFD.
pub(crate) fn clamp_scalar(member: &[u8], padding: StringPadding, buffer_width: usize) -> String {
    let mut visible = slot_payload(&member[..member.len().min(buffer_width)], padding);
    if member.len() > buffer_width {
        visible = whole_chars(visible);
    }
    String::from_utf8_lossy(visible).into_owned()
}

/// Convert `count` stored slots of `slot_width` bytes into `word_width`-byte
/// NUL-terminated, NUL-padded slots. Payloads longer than `word_width - 1`
/// are cut.
pub(crate) fn to_word_slots(
    raw: &[u8],
    slot_width: usize,
    padding: StringPadding,
    word_width: usize,
) -> Vec<u8> {
    if slot_width == 0 || word_width == 0 {
        return Vec::new();
    }
    let count = raw.len() / slot_width;
    let mut out = vec![0u8; count * word_width];
    for (slot, dst) in raw.chunks_exact(slot_width).zip(out.chunks_exact_mut(word_width)) {
        let payload = slot_payload(slot, padding);
        let n = payload.len().min(word_width - 1);
        dst[..n].copy_from_slice(&payload[..n]);
    }
    out
}

/// Split a packed buffer into `count` strings.
///
/// Each token runs to the next NUL or the end of the buffer; the NUL run
/// after it is skipped. Returns the number of tokens found when the buffer
/// ends before `count` of them.
pub(crate) fn split_packed(buf: &[u8], count: usize) -> Result<Vec<String>, usize> {
    let mut out = Vec::with_capacity(count.min(buf.len()));
    let mut pos = 0;
    while out.len() < count {
        if pos >= buf.len() {
            return Err(out.len());
        }
        let end = buf[pos..]
            .iter()
            .position(|&b| b == 0)
            .map_or(buf.len(), |n| pos + n);
        out.push(String::from_utf8_lossy(&buf[pos..end]).into_owned());
        pos = end;
        while pos < buf.len() && buf[pos] == 0 {
            pos += 1;
        }
    }
    Ok(out)
}
