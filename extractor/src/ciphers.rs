//! Cryptographic primitives backing the protected-section scheme.
//!
//! The container protects sections with a two-layer scheme: a Serpent-CBC
//! body keyed by 16 bytes of material that is itself recovered from an
//! RSA-style block using the *public* exponent. The asymmetric step is not
//! confidentiality-RSA; the format uses the key pair in reverse, so the
//! public transform here is a raw `c^e mod n` with no padding scheme.

use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};

use crate::error::{ExtractError, Result};

type SerpentCbcDec = cbc::Decryptor<serpent::Serpent>;

/// Serpent block and key size used by the container, in bytes.
pub const SERPENT_BLOCK: usize = 16;

/// Capability wrapping a resolved public key: the RSA key itself plus its
/// PEM export, produced once per top-level decode and required by every
/// later protected-section decrypt.
#[derive(Debug, Clone)]
pub struct PublicKeyHandle {
    key: RsaPublicKey,
    pem: String,
}

impl PublicKeyHandle {
    /// Wraps an already-built RSA public key, exporting its PEM form.
    ///
    /// # Arguments
    /// * `key` - The RSA public key.
    ///
    /// # Returns
    /// A handle carrying the key and its PEM export.
    ///
    /// # Errors
    /// `Decrypt` if the PEM export fails.
    pub fn new(key: RsaPublicKey) -> Result<Self> {
        let pem = key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|error| ExtractError::decrypt_error(&format!("PEM export failed: {}", error)))?;
        Ok(Self { key, pem })
    }

    /// The PEM export of the wrapped key.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// The key size in bytes; one RSA-style block is exactly this long.
    pub fn block_len(&self) -> usize {
        self.key.size()
    }
}

/// Builds a public-key handle from raw big-endian modulus and exponent
/// bytes as they appear in the key section.
///
/// # Arguments
/// * `modulus` - Big-endian modulus bytes.
/// * `exponent` - Big-endian public exponent bytes.
///
/// # Returns
/// A `PublicKeyHandle` with the PEM export already computed.
///
/// # Errors
/// `Decrypt` if the pair does not form a usable RSA public key.
pub fn build_public_key(modulus: &[u8], exponent: &[u8]) -> Result<PublicKeyHandle> {
    let n = BigUint::from_bytes_be(modulus);
    let e = BigUint::from_bytes_be(exponent);
    let key = RsaPublicKey::new(n, e)?;
    PublicKeyHandle::new(key)
}

/// Applies the raw public-exponent transform to one RSA-style block.
///
/// # Arguments
/// * `handle` - The resolved public key.
/// * `block` - The block to transform; must be exactly the key byte size.
///
/// # Returns
/// The transformed block, left-padded back to the key byte size.
///
/// # Errors
/// `Decrypt` if the block length does not match the key size.
pub fn public_transform(handle: &PublicKeyHandle, block: &[u8]) -> Result<Vec<u8>> {
    let block_len = handle.block_len();
    if block.len() != block_len {
        return Err(ExtractError::decrypt_error(&format!(
            "RSA block is {} bytes, key expects {}",
            block.len(),
            block_len
        )));
    }
    let c = BigUint::from_bytes_be(block);
    let m = c.modpow(handle.key.e(), handle.key.n());
    let raw = m.to_bytes_be();
    let mut out = vec![0u8; block_len - raw.len()];
    out.extend_from_slice(&raw);
    Ok(out)
}

/// Decrypts a Serpent-CBC ciphertext with an all-zero IV and no padding.
///
/// # Arguments
/// * `key` - The 16-byte Serpent key recovered from the RSA block.
/// * `ciphertext` - The body to decrypt; length must be a multiple of the
///   16-byte block size.
///
/// # Returns
/// The decrypted plaintext, same length as the ciphertext.
///
/// # Errors
/// `Decrypt` if either length constraint is violated.
pub fn serpent_cbc_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if key.len() != SERPENT_BLOCK {
        return Err(ExtractError::decrypt_error(
            "Serpent key must be 16 bytes",
        ));
    }
    if ciphertext.len() % SERPENT_BLOCK != 0 {
        return Err(ExtractError::decrypt_error(
            "Serpent ciphertext length must be a multiple of 16 bytes",
        ));
    }
    let iv = [0u8; SERPENT_BLOCK];
    let decryptor = SerpentCbcDec::new_from_slices(key, &iv)
        .map_err(|error| ExtractError::decrypt_error(&format!("cipher setup failed: {}", error)))?;
    decryptor
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| ExtractError::decrypt_error("Serpent-CBC decryption failed"))
}

#[cfg(test)]
pub(crate) mod testkit {
    use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
    use rsa::traits::{PrivateKeyParts, PublicKeyParts};
    use rsa::{BigUint, RsaPrivateKey};

    use super::SERPENT_BLOCK;

    type SerpentCbcEnc = cbc::Encryptor<serpent::Serpent>;

    /// Serpent-CBC encryption with the zero IV the decoder assumes.
    pub fn serpent_cbc_encrypt(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        assert_eq!(plaintext.len() % SERPENT_BLOCK, 0);
        let iv = [0u8; SERPENT_BLOCK];
        SerpentCbcEnc::new_from_slices(key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<NoPadding>(plaintext)
    }

    /// Builds the padded block `prefix | 0xFF * ff_run | 0x00 | key | fill`
    /// and applies the private exponent so that the decoder's public
    /// transform recovers it.
    pub fn seal_key_block(private: &RsaPrivateKey, serp_key: &[u8; 16], ff_run: usize) -> Vec<u8> {
        let block_len = private.size();
        let mut padded = vec![0u8; block_len];
        padded[1] = 0x02;
        let mut at = 2;
        for _ in 0..ff_run {
            padded[at] = 0xff;
            at += 1;
        }
        padded[at] = 0x00;
        at += 1;
        padded[at..at + serp_key.len()].copy_from_slice(serp_key);
        for byte in padded.iter_mut().skip(at + serp_key.len()) {
            *byte = 0x11;
        }

        let m = BigUint::from_bytes_be(&padded);
        let c = m.modpow(private.d(), private.n());
        let raw = c.to_bytes_be();
        let mut block = vec![0u8; block_len - raw.len()];
        block.extend_from_slice(&raw);
        block
    }

    /// Assembles a full protected section: Serpent body followed by the
    /// sealed RSA block.
    pub fn seal_protected_section(
        private: &RsaPrivateKey,
        serp_key: &[u8; 16],
        plaintext: &[u8],
        ff_run: usize,
    ) -> Vec<u8> {
        let mut blob = serpent_cbc_encrypt(serp_key, plaintext);
        blob.extend_from_slice(&seal_key_block(private, serp_key, ff_run));
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::testkit::serpent_cbc_encrypt;
    use super::*;

    #[test]
    fn serpent_cbc_round_trip() {
        let key = [0x42u8; 16];
        let plaintext = b"sixteen byte blk sixteen byte bl";
        let ciphertext = serpent_cbc_encrypt(&key, plaintext);
        assert_ne!(&ciphertext[..], &plaintext[..]);
        assert_eq!(serpent_cbc_decrypt(&key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn serpent_rejects_bad_lengths() {
        assert!(serpent_cbc_decrypt(&[0u8; 8], &[0u8; 16]).is_err());
        assert!(serpent_cbc_decrypt(&[0u8; 16], &[0u8; 15]).is_err());
    }

    #[test]
    fn public_transform_inverts_private_exponent() {
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let handle = PublicKeyHandle::new(private.to_public_key()).unwrap();

        let serp_key = [0xa5u8; 16];
        let block = testkit::seal_key_block(&private, &serp_key, 4);
        let decoded = public_transform(&handle, &block).unwrap();
        assert_eq!(&decoded[..2], &[0x00, 0x02]);
        assert_eq!(&decoded[2..6], &[0xff; 4]);
        assert_eq!(decoded[6], 0x00);
        assert_eq!(&decoded[7..23], &serp_key);
    }

    #[test]
    fn public_transform_rejects_short_block() {
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let handle = PublicKeyHandle::new(private.to_public_key()).unwrap();
        assert!(public_transform(&handle, &[0u8; 64]).is_err());
    }

    #[test]
    fn build_public_key_exports_pem() {
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = private.to_public_key();
        let handle =
            build_public_key(&public.n().to_bytes_be(), &public.e().to_bytes_be()).unwrap();
        assert_eq!(handle.block_len(), 128);
        assert!(handle.pem().starts_with("-----BEGIN PUBLIC KEY-----"));
    }
}
