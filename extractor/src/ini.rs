//! Parsing the decrypted client-INI parameter array.
//!
//! The blob opens with a record count, an 8-byte header, then fixed
//! 24-byte records of `(hash, flag, offset)` plus reserved bytes. Names
//! come from a static hash table; values are NUL-terminated strings the
//! records point at inside the decrypted blob.

use crate::bytes::read_u32_le;
use crate::error::{ExtractError, Result};

/// Record stride: three u32 fields plus 12 reserved bytes.
const RECORD_STRIDE: usize = 24;

/// Header bytes before the first record (includes the count word).
const HEADER_LEN: usize = 8;

/// Static hash-to-name table for known INI parameters.
///
/// Hashes absent from this table surface as "UNKNOWN".
pub const INI_PARAMS: &[(u32, &str)] = &[
    (0x4fa8_693e, "CRC_SERVERKEY"),
    (0xd066_5bf6, "CRC_HOSTS"),
    (0x656b_798a, "CRC_GROUP"),
    (0x556a_ed8f, "CRC_SERVER"),
    (0x1127_1c7f, "CONF_TIMEOUT"),
    (0x4829_5783, "CONFIG_FAIL_TIMEOUT"),
    (0xea9e_a760, "CRC_BOOTSTRAP"),
    (0x3127_7bd5, "CRC_TASKTIMEOUT"),
    (0x9558_79a6, "CRC_SENDTIMEOUT"),
    (0x9fd1_3931, "CRC_BCSERVER"),
    (0x6de8_5128, "CRC_BCTIMEOUT"),
    (0xacc7_9a02, "CRC_KNOCKERTIMEOUT"),
    (0x602c_2c26, "CRC_KEYLOGLIST"),
    (0xd7a0_03c9, "CRC_CONFIGTIMEOUT"),
    (0x18a6_32bb, "CRC_CONFIGFAILTIMEOUT"),
    (0x7317_7345, "CRC_DGA_SEED_URL"),
    (0x510f_22d2, "CRC_TORSERVER"),
    (0xec99_df2e, "CRC_EXTERNALIP"),
    (0xc61e_fa7a, "CRC_DGATLDS"),
    (0xdf35_1e24, "CRC_32BITDOWNLOAD"),
    (0x4b21_4f54, "CRC_64BITDOWNLOAD"),
    (0xcd85_0e68, "DGA_CRC"),
    (0xdf2e_7488, "DGA_COUNT"),
    (0x584e_5925, "TIMER"),
];

/// Resolves a parameter hash to its name, or "UNKNOWN".
pub fn param_name(hash: u32) -> &'static str {
    INI_PARAMS
        .iter()
        .find(|(known, _)| *known == hash)
        .map_or("UNKNOWN", |(_, name)| name)
}

/// One decoded INI parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniParameter {
    pub hash: u32,
    pub name: &'static str,
    pub value: String,
}

/// Parses the decrypted client-INI blob into its parameter list.
///
/// Value offsets are interpreted against the whole decrypted blob. A
/// record whose offset points outside the blob yields an empty value
/// rather than failing the section. Insertion order is preserved.
///
/// # Arguments
/// * `blob` - The decrypted client-INI plaintext.
///
/// # Returns
/// The parameters in record order.
///
/// # Errors
/// `Format` if the blob is shorter than its header or the declared record
/// count does not fit the blob.
pub fn parse_ini_parameters(blob: &[u8]) -> Result<Vec<IniParameter>> {
    let count = read_u32_le(blob, 0)
        .ok_or_else(|| ExtractError::format_error("INI blob shorter than its record count"))?
        as usize;
    if count > 0 {
        // The final record's 12 reserved bytes may be absent, so only the
        // field words of every record are required to fit.
        let need = count
            .checked_sub(1)
            .and_then(|n| n.checked_mul(RECORD_STRIDE))
            .and_then(|n| n.checked_add(HEADER_LEN + 12))
            .ok_or_else(|| ExtractError::format_error("INI record count overflows"))?;
        if need > blob.len() {
            return Err(ExtractError::format_error(
                "INI record count does not fit the blob",
            ));
        }
    }

    let mut parameters = Vec::with_capacity(count);
    let mut record_at = HEADER_LEN;
    for _ in 0..count {
        let hash = read_u32_le(blob, record_at)
            .ok_or_else(|| ExtractError::format_error("INI record truncated"))?;
        let _flag = read_u32_le(blob, record_at + 4)
            .ok_or_else(|| ExtractError::format_error("INI record truncated"))?;
        let offset = read_u32_le(blob, record_at + 8)
            .ok_or_else(|| ExtractError::format_error("INI record truncated"))?
            as usize;
        record_at += RECORD_STRIDE;

        parameters.push(IniParameter {
            hash,
            name: param_name(hash),
            value: string_at(blob, offset),
        });
    }
    Ok(parameters)
}

/// Reads the NUL-terminated string starting at `offset`, lossily decoded;
/// out-of-bounds offsets read as empty.
fn string_at(blob: &[u8], offset: usize) -> String {
    let Some(tail) = blob.get(offset..) else {
        return String::new();
    };
    let end = tail.iter().position(|&byte| byte == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).into_owned()
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::{HEADER_LEN, RECORD_STRIDE};

    /// Builds a blob with the given `(hash, value)` pairs, strings packed
    /// after the record array.
    pub(crate) fn build_ini_blob(params: &[(u32, &str)]) -> Vec<u8> {
        let strings_at = HEADER_LEN + params.len() * RECORD_STRIDE;
        let mut blob = Vec::new();
        blob.extend_from_slice(&(params.len() as u32).to_le_bytes());
        blob.extend_from_slice(&[0u8; 4]);
        let mut cursor = strings_at;
        for (hash, value) in params {
            blob.extend_from_slice(&hash.to_le_bytes());
            blob.extend_from_slice(&0u32.to_le_bytes());
            blob.extend_from_slice(&(cursor as u32).to_le_bytes());
            blob.extend_from_slice(&[0u8; 12]);
            cursor += value.len() + 1;
        }
        for (_, value) in params {
            blob.extend_from_slice(value.as_bytes());
            blob.push(0);
        }
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::build_ini_blob;
    use super::*;

    #[test]
    fn parses_known_parameters_in_order() {
        let blob = build_ini_blob(&[
            (0x556a_ed8f, "a"),
            (0x656b_798a, "bb"),
            (0xd066_5bf6, "ccc"),
        ]);
        let parameters = parse_ini_parameters(&blob).unwrap();
        let named: Vec<(&str, &str)> = parameters
            .iter()
            .map(|parameter| (parameter.name, parameter.value.as_str()))
            .collect();
        assert_eq!(
            named,
            vec![
                ("CRC_SERVER", "a"),
                ("CRC_GROUP", "bb"),
                ("CRC_HOSTS", "ccc"),
            ]
        );
    }

    #[test]
    fn unknown_hashes_group_under_unknown() {
        let blob = build_ini_blob(&[(0x0101_0101, "first"), (0x0202_0202, "second")]);
        let parameters = parse_ini_parameters(&blob).unwrap();
        assert_eq!(parameters[0].name, "UNKNOWN");
        assert_eq!(parameters[1].name, "UNKNOWN");
        assert_eq!(parameters[1].value, "second");
    }

    #[test]
    fn out_of_bounds_value_offset_reads_empty() {
        let mut blob = build_ini_blob(&[(0x556a_ed8f, "x")]);
        let offset_at = HEADER_LEN + 8;
        blob[offset_at..offset_at + 4].copy_from_slice(&0xffff_0000u32.to_le_bytes());
        let parameters = parse_ini_parameters(&blob).unwrap();
        assert_eq!(parameters[0].value, "");
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut blob = build_ini_blob(&[(0x556a_ed8f, "x")]);
        blob[0..4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(parse_ini_parameters(&blob).is_err());
    }

    #[test]
    fn empty_blob_is_rejected() {
        assert!(parse_ini_parameters(&[]).is_err());
    }
}
