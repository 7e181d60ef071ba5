//! Little-endian field reads and byte scanning over raw image slices.
//!
//! Every structure in the container is little-endian and frequently sits at
//! an attacker-controlled offset, so all reads here are bounds-checked and
//! return `Option` instead of panicking.

/// Reads a little-endian `u32` at `offset`, if the slice is long enough.
pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads a little-endian `u16` at `offset`, if the slice is long enough.
pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Returns the position of the first occurrence of `needle` in `haystack`.
///
/// # Arguments
/// * `haystack` - The bytes to scan.
/// * `needle` - The marker to find; must be non-empty.
///
/// # Returns
/// The byte offset of the first match, or `None` if absent.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_u32_le_in_bounds() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xff];
        assert_eq!(read_u32_le(&data, 0), Some(0x12345678));
        assert_eq!(read_u32_le(&data, 1), Some(0xff123456));
    }

    #[test]
    fn read_u32_le_out_of_bounds() {
        let data = [0x01, 0x02, 0x03];
        assert_eq!(read_u32_le(&data, 0), None);
        assert_eq!(read_u32_le(&data, usize::MAX), None);
    }

    #[test]
    fn read_u16_le_in_bounds() {
        let data = [0xcd, 0xab];
        assert_eq!(read_u16_le(&data, 0), Some(0xabcd));
        assert_eq!(read_u16_le(&data, 1), None);
    }

    #[test]
    fn find_subslice_positions() {
        let data = b"\x00\x00WD rest";
        assert_eq!(find_subslice(data, b"\x00\x00WD"), Some(0));
        assert_eq!(find_subslice(data, b"WD"), Some(2));
        assert_eq!(find_subslice(data, b"XY"), None);
        assert_eq!(find_subslice(data, b""), None);
    }
}
