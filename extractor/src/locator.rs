//! Locating the XOR-obfuscated section table inside an image.
//!
//! Two layouts exist in the wild. The common one hides the table as a short
//! non-zero run bounded by long zero runs, self-describing through a length
//! word. The "mangled" layout starts with a `PX` magic; its table sits at a
//! fixed marker and the rest of the image has been scattered into
//! (from, to, length) copy records that must be replayed to rebuild a flat
//! image before section offsets resolve.

use crate::bytes::{find_subslice, read_u16_le, read_u32_le};

/// Minimum zero-run length bounding the table on each side.
const MIN_ZERO_RUN: usize = 40;

/// Exclusive table length bounds.
const MIN_TABLE_LEN: usize = 40;
const MAX_TABLE_LEN: usize = 100;

/// Magic of the mangled layout.
pub const MANGLED_MAGIC: &[u8; 2] = b"PX";

/// Marker preceding the table in the mangled layout; the table blob starts
/// two bytes before it.
const MANGLED_TABLE_MARKER: &[u8] = b"\x00\x00WD";

/// Rebuild limits for the mangled layout.
const MANGLED_MAX_IMAGE: usize = 0x30000;
const MANGLED_MAX_SECTIONS: u16 = 30;

/// Offset of the copy-record count in the mangled header.
const MANGLED_COUNT_AT: usize = 0x62;

/// Offset of the first 20-byte copy record.
const MANGLED_RECORDS_AT: usize = 0x68;

/// Finds the section table in a flat image.
///
/// Splits the image on zero runs of at least 40 bytes and keeps the pieces
/// strictly between 40 and 100 bytes long. The table is the first piece
/// whose leading little-endian u32 equals the piece length plus 4: the
/// declared blob length, the piece having lost trailing zeros to the split.
///
/// # Arguments
/// * `data` - The flat image bytes.
///
/// # Returns
/// The table blob, or `None` when no piece qualifies.
pub fn find_xor_table(data: &[u8]) -> Option<&[u8]> {
    let mut piece_start = 0usize;
    let mut at = 0usize;
    let mut check = |piece: &[u8]| -> bool {
        piece.len() > MIN_TABLE_LEN
            && piece.len() < MAX_TABLE_LEN
            && read_u32_le(piece, 0) == Some(piece.len() as u32 + 4)
    };

    while at < data.len() {
        if data[at] != 0 {
            at += 1;
            continue;
        }
        let run_start = at;
        while at < data.len() && data[at] == 0 {
            at += 1;
        }
        if at - run_start >= MIN_ZERO_RUN {
            if check(&data[piece_start..run_start]) {
                return Some(&data[piece_start..run_start]);
            }
            piece_start = at;
        }
    }
    if check(&data[piece_start..]) {
        return Some(&data[piece_start..]);
    }
    None
}

/// Finds the table blob of a mangled (`PX`) image.
///
/// The blob runs from two bytes before the `\x00\x00WD` marker to the end
/// of the image.
pub fn mangled_table(data: &[u8]) -> Option<&[u8]> {
    let marker = find_subslice(data, MANGLED_TABLE_MARKER)?;
    if marker < 2 {
        return None;
    }
    Some(&data[marker - 2..])
}

/// Replays a mangled image's copy records into a flat image.
///
/// The header carries five u32 words, the fifth declaring the rebuilt image
/// size, a record count at 0x62 and 20-byte copy records from 0x68 with
/// fields `(to_offset, final_length, from_offset, length)`. Copies are
/// clamped to both buffers.
///
/// # Arguments
/// * `data` - The mangled image bytes.
///
/// # Returns
/// The rebuilt flat image, or `None` when the declared size exceeds
/// 0x30000, the record count exceeds 30, or the header is truncated.
pub fn rebuild_mangled_image(data: &[u8]) -> Option<Vec<u8>> {
    let declared_size = read_u32_le(data, 16)? as usize;
    if declared_size > MANGLED_MAX_IMAGE {
        return None;
    }
    let record_count = read_u16_le(data, MANGLED_COUNT_AT)?;
    if record_count > MANGLED_MAX_SECTIONS {
        return None;
    }

    let mut image = vec![0u8; declared_size];
    let mut record_at = MANGLED_RECORDS_AT;
    for _ in 0..record_count {
        let to_offset = read_u32_le(data, record_at)? as usize;
        let from_offset = read_u32_le(data, record_at + 8)? as usize;
        let length = read_u32_le(data, record_at + 12)? as usize;
        record_at += 0x14;

        if to_offset >= image.len() || from_offset >= data.len() {
            continue;
        }
        let copy_len = length
            .min(data.len() - from_offset)
            .min(image.len() - to_offset);
        image[to_offset..to_offset + copy_len]
            .copy_from_slice(&data[from_offset..from_offset + copy_len]);
    }
    Some(image)
}
