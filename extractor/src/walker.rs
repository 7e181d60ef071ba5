//! Walking the chained XOR-scrambled descriptor records.
//!
//! The table body is a sequence of 16-byte records, each four little-endian
//! words `(chain_key, val2, xorval, val3)`, terminated by a zero chain key.
//! Nothing is stored in the clear: every real field is recovered by XORing
//! against `xorval`. One encoding variant stores the first three words
//! rotated; `chain_key ^ xorval` landing below 0x50000 betrays it (a real
//! crc hash is never that small) and a double swap restores the order.

use crate::bytes::read_u32_le;
use crate::error::{ExtractError, Result};

/// Threshold of the rotated-record predicate.
const SWAP_THRESHOLD: u32 = 0x50000;

/// One decoded section descriptor.
///
/// All fields are already un-XORed; `offset` and `length` address the flat
/// image the table was found in, not the table itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionDescriptor {
    /// Identifies the section's role; matched against the well-known table.
    pub crc_hash: u32,
    /// Section start within the flat image.
    pub offset: u32,
    /// Section length in bytes.
    pub length: u32,
    /// Set when the section payload is aPLib-compressed rather than
    /// key-protected.
    pub decompress: bool,
}

/// Lazy iterator over the descriptor chain.
///
/// Yields `Ok(descriptor)` per record until the zero sentinel; a record
/// running off the end of the blob yields one `Err` and then fuses. The
/// cursor is consumed, the walk is not restartable.
pub struct DescriptorWalker<'a> {
    data: &'a [u8],
    at: usize,
    done: bool,
}

impl<'a> DescriptorWalker<'a> {
    /// Starts a walk over the table body (the bytes following the 8-byte
    /// table header, with the sentinel padding already appended).
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            at: 0,
            done: false,
        }
    }

    fn read_record(&mut self) -> Result<Option<SectionDescriptor>> {
        let chain_key = read_u32_le(self.data, self.at)
            .ok_or_else(|| ExtractError::format_error("descriptor chain is truncated"))?;
        if chain_key == 0 {
            return Ok(None);
        }
        let val2 = read_u32_le(self.data, self.at + 4);
        let xorval = read_u32_le(self.data, self.at + 8);
        let val3 = read_u32_le(self.data, self.at + 12);
        let (Some(mut val2), Some(mut xorval), Some(val3)) = (val2, xorval, val3) else {
            return Err(ExtractError::format_error(
                "descriptor record is truncated mid-chain",
            ));
        };
        self.at += 16;

        let mut chain_key = chain_key;
        if chain_key ^ xorval < SWAP_THRESHOLD {
            // Alternate encoding stores the first three words rotated.
            std::mem::swap(&mut xorval, &mut val2);
            std::mem::swap(&mut xorval, &mut chain_key);
        }

        Ok(Some(SectionDescriptor {
            crc_hash: xorval ^ chain_key,
            offset: xorval ^ val3,
            length: xorval ^ val2,
            decompress: xorval & 1 == 1,
        }))
    }
}

impl Iterator for DescriptorWalker<'_> {
    type Item = Result<SectionDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(descriptor)) => Some(Ok(descriptor)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}
