//! Input sniffing and PE-to-virtual-layout mapping.
//!
//! Samples arrive either as a flat, already-mapped image or as a PE file on
//! disk. Descriptor offsets inside the container are virtual addresses, so
//! a disk-layout PE must be re-composed into its virtual layout (headers in
//! place, each section copied to its RVA) before the table is located.

use goblin::pe::PE;

use crate::error::{ExtractError, Result};

/// Upper bound on a composed image, to bound hostile size declarations.
const MAX_IMAGE_SIZE: usize = 0x200_0000;

/// Window checked for the disk-layout heuristic: a mapped image keeps this
/// range zeroed, a disk-layout PE has section data there.
const PROBE_WINDOW: std::ops::Range<usize> = 0x400..0x500;

/// Decides whether the buffer is a disk-layout PE that needs mapping.
///
/// The sniff requires the `MZ` magic and at least one non-zero byte in the
/// 0x400..0x500 window; flat dumps keep that window zeroed.
pub fn looks_like_unmapped_pe(data: &[u8]) -> bool {
    data.len() >= PROBE_WINDOW.end
        && data.starts_with(b"MZ")
        && data[PROBE_WINDOW].iter().any(|&byte| byte != 0)
}

/// Re-composes a disk-layout PE into its virtual-address layout.
///
/// Headers are copied verbatim; each section's raw data is copied to its
/// RVA in a zero-filled buffer of the declared image size. Copies are
/// clamped to both the source file and the destination image, so a section
/// header lying about sizes degrades to a short copy instead of a failure.
///
/// # Arguments
/// * `data` - The raw PE file bytes.
///
/// # Returns
/// The flat virtual-layout image.
///
/// # Errors
/// `Format` if the PE cannot be parsed or declares a missing, zero or
/// oversized image size.
pub fn map_virtual_layout(data: &[u8]) -> Result<Vec<u8>> {
    let pe = PE::parse(data)?;
    let optional = pe
        .header
        .optional_header
        .ok_or_else(|| ExtractError::format_error("PE has no optional header"))?;

    let image_size = optional.windows_fields.size_of_image as usize;
    if image_size == 0 || image_size > MAX_IMAGE_SIZE {
        return Err(ExtractError::format_error(
            "PE declares an implausible image size",
        ));
    }

    let mut image = vec![0u8; image_size];
    let header_len = (optional.windows_fields.size_of_headers as usize)
        .min(data.len())
        .min(image_size);
    image[..header_len].copy_from_slice(&data[..header_len]);

    for section in &pe.sections {
        let rva = section.virtual_address as usize;
        let raw = section.pointer_to_raw_data as usize;
        if rva >= image_size || raw >= data.len() {
            continue;
        }
        let len = (section.size_of_raw_data as usize)
            .min(data.len() - raw)
            .min(image_size - rva);
        image[rva..rva + len].copy_from_slice(&data[raw..raw + len]);
    }

    log::debug!(
        "mapped PE: {} sections into {:#x} byte image",
        pe.sections.len(),
        image_size
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_is_not_sniffed_as_pe() {
        // MZ magic but a zeroed probe window means already mapped.
        let mut data = vec![0u8; 0x600];
        data[0] = b'M';
        data[1] = b'Z';
        assert!(!looks_like_unmapped_pe(&data));
    }

    #[test]
    fn disk_layout_pe_is_sniffed() {
        let mut data = vec![0u8; 0x600];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x450] = 0x90;
        assert!(looks_like_unmapped_pe(&data));
    }

    #[test]
    fn short_or_foreign_buffers_are_not_sniffed() {
        assert!(!looks_like_unmapped_pe(b"MZ"));
        let mut data = vec![0x90u8; 0x600];
        data[0] = b'P';
        data[1] = b'X';
        assert!(!looks_like_unmapped_pe(&data));
    }

    #[test]
    fn map_rejects_non_pe_bytes() {
        let data = vec![0x41u8; 0x600];
        assert!(map_virtual_layout(&data).is_err());
    }
}
