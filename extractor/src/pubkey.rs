//! Public-key section parsing and the protected-section decode.
//!
//! The key section carries a plain structure: a 32-bit bit-size marker
//! (1024 for every known sample), the modulus, then the public exponent.
//! Protected sections append one RSA-style block to a Serpent-CBC body; the
//! block hides the 16-byte Serpent key behind a padding layout that must be
//! stripped with exact byte-offset semantics: a 2-byte prefix, a variable
//! run of 0xFF bytes, and an optional single 0x00 separator.

use crate::bytes::read_u32_le;
use crate::ciphers::{self, PublicKeyHandle, SERPENT_BLOCK};
use crate::depack;
use crate::error::{ExtractError, Result};

/// Bit-size marker opening a raw (uncompressed) key structure.
pub const KEY_BITS_MARKER: u32 = 1024;

/// Fixed trailer length excluded from the Serpent body of a protected
/// section.
const PROTECTED_TRAILER: usize = 128;

/// Parses a raw public-key structure into a usable handle.
///
/// # Arguments
/// * `data` - The key structure: `bits:u32 | modulus | exponent`.
///
/// # Returns
/// The built `PublicKeyHandle`.
///
/// # Errors
/// `Format` if the declared bit size does not fit the buffer or leaves no
/// exponent bytes; `Decrypt` if the pair is not a valid RSA public key.
pub fn parse_key_structure(data: &[u8]) -> Result<PublicKeyHandle> {
    let bits = read_u32_le(data, 0)
        .ok_or_else(|| ExtractError::format_error("key structure shorter than its bit marker"))?;
    if bits == 0 || bits % 8 != 0 || bits > 0x4000 {
        return Err(ExtractError::format_error(
            "key structure declares an implausible bit size",
        ));
    }
    let modulus_len = bits as usize / 8;
    let exponent_at = 4 + modulus_len;
    if data.len() <= exponent_at {
        return Err(ExtractError::format_error(
            "key structure truncated before the exponent",
        ));
    }
    ciphers::build_public_key(&data[4..exponent_at], &data[exponent_at..])
}

/// Decompresses and parses the key section payload as found through the
/// descriptor table.
pub fn parse_compressed_key(data: &[u8]) -> Result<PublicKeyHandle> {
    let plain = depack::decompress(data)?;
    parse_key_structure(&plain)
}

/// Walks the padding of a decoded RSA block and returns the 16-byte
/// Serpent key: skip 2 prefix bytes, the 0xFF run, one 0x00 if present.
///
/// # Arguments
/// * `block` - The block after the public transform.
///
/// # Returns
/// The 16 key bytes starting at the post-padding offset.
///
/// # Errors
/// `Decrypt` if the padding consumes the block before a full key remains.
pub fn stream_key_from_block(block: &[u8]) -> Result<[u8; SERPENT_BLOCK]> {
    if block.len() < 2 {
        return Err(ExtractError::decrypt_error("RSA block shorter than its prefix"));
    }
    let mut rest = &block[2..];
    while let Some((&0xff, tail)) = rest.split_first() {
        rest = tail;
    }
    if let Some((&0x00, tail)) = rest.split_first() {
        rest = tail;
    }
    let key: &[u8] = rest.get(..SERPENT_BLOCK).ok_or_else(|| {
        ExtractError::decrypt_error("padding consumed the RSA block before the key")
    })?;
    let mut out = [0u8; SERPENT_BLOCK];
    out.copy_from_slice(key);
    Ok(out)
}

/// Decodes a protected section: public-transforms the trailing RSA block,
/// recovers the Serpent key from its padding, and decrypts the body.
///
/// The body is everything but the fixed 128-byte trailer, masked down to a
/// multiple of the Serpent block size.
///
/// # Arguments
/// * `handle` - The resolved public key.
/// * `blob` - The full protected section payload.
///
/// # Returns
/// The decrypted section plaintext.
///
/// # Errors
/// `Decrypt` if the blob is too short for one RSA block plus trailer, or
/// any layer of the transform fails.
pub fn decode_protected(handle: &PublicKeyHandle, blob: &[u8]) -> Result<Vec<u8>> {
    let block_len = handle.block_len();
    if blob.len() < block_len.max(PROTECTED_TRAILER) {
        return Err(ExtractError::decrypt_error(
            "protected section shorter than one RSA block",
        ));
    }
    let decoded = ciphers::public_transform(handle, &blob[blob.len() - block_len..])?;
    let key = stream_key_from_block(&decoded)?;
    let body_len = (blob.len() - PROTECTED_TRAILER) & !(SERPENT_BLOCK - 1);
    ciphers::serpent_cbc_decrypt(&key, &blob[..body_len])
}
