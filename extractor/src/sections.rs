//! Classification of decoded descriptors into well-known section roles.
//!
//! A small fixed set of crc hashes marks "joiner" sections with structural
//! roles; everything else is generic payload that is deferred and resolved
//! after the whole chain has been walked.

/// Well-known joiner-section roles, closed so dispatch stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// The RSA public key structure (aPLib-compressed in this form).
    PublicKey,
    /// The encrypted client configuration blob with the INI parameters.
    ClientIni,
    /// Install-time configuration; recognized but carries no handler.
    InstallIni,
    /// 64-bit client module; recognized but carries no handler.
    Client64,
    /// aPLib-compressed word list used for DGA-style name generation.
    WordList,
}

pub const CRC_PUBLIC_KEY: u32 = 0xe128_5e64;
pub const CRC_CLIENT_INI: u32 = 0x8fb1_dde1;
pub const CRC_CLIENT_INI_ALT: u32 = 0xd722_afcb;
pub const CRC_INSTALL_INI: u32 = 0x7a04_2a8a;
pub const CRC_CLIENT64: u32 = 0x90f8_aab4;
pub const CRC_WORDLIST: u32 = 0xda57_d71a;

impl SectionKind {
    /// Resolves a descriptor's crc hash to a well-known role.
    pub fn from_crc(crc_hash: u32) -> Option<Self> {
        match crc_hash {
            CRC_PUBLIC_KEY => Some(Self::PublicKey),
            CRC_CLIENT_INI | CRC_CLIENT_INI_ALT => Some(Self::ClientIni),
            CRC_INSTALL_INI => Some(Self::InstallIni),
            CRC_CLIENT64 => Some(Self::Client64),
            CRC_WORDLIST => Some(Self::WordList),
            _ => None,
        }
    }

    /// The section's name as used in reports and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PublicKey => "CRC_PUBLIC_KEY",
            Self::ClientIni => "CRC_CLIENT_INI",
            Self::InstallIni => "CRC_INSTALL_INI",
            Self::Client64 => "CRC_CLIENT64",
            Self::WordList => "CRC_WORDLIST",
        }
    }
}

/// A generic section parked until the chain walk finishes.
///
/// Sections whose descriptor carried the compression bit are stored
/// decompressed; the rest are still key-protected and wait for the public
/// key to resolve. The deferred list is sorted ascending by payload length
/// before resolution so the key section (smallest) always comes first;
/// that ordering is a correctness invariant, not an optimization.
#[derive(Debug)]
pub struct DeferredSection {
    /// Still encrypted; requires the public key to resolve.
    pub needs_asymmetric: bool,
    /// Decompressed bytes, or the raw encrypted slice.
    pub payload: Vec<u8>,
    /// The descriptor's crc hash, used as a report key for opaque blobs.
    pub crc_hash: u32,
}
