pub type Result<T> = std::result::Result<T, ExtractError>;

/// Enum to represent the different failure classes of the extractor.
///
/// Structural failures (`Format`) are fatal to a decode attempt, while the
/// per-section classes (`Truncated`, `Decompress`, `Decrypt`, `MissingKey`)
/// are usually downgraded to diagnostics by the decoder so sibling sections
/// keep processing. `Io` only occurs on the CLI path.
#[derive(Debug)]
pub enum ExtractError {
    /// An IO error while reading the input sample.
    Io {
        /// The kind of IO error.
        error_type: String,
        /// The error message.
        msg: String,
    },
    /// The container structure is malformed (table not found, counts or
    /// sizes out of bounds, truncated descriptor chain).
    Format {
        /// The error message.
        msg: String,
    },
    /// An asymmetric section was processed before the public key resolved.
    MissingKey {
        /// What needed the key.
        context: String,
    },
    /// A compressed section failed to decompress.
    Decompress {
        /// The error message.
        msg: String,
    },
    /// A protected section failed to decrypt or a key failed to build.
    Decrypt {
        /// The error message.
        msg: String,
    },
    /// A descriptor-derived slice falls outside the image.
    Truncated {
        /// Declared section offset.
        offset: u64,
        /// Declared section length.
        length: u64,
        /// Bytes actually available in the image.
        available: u64,
    },
    /// Nested module recursion exceeded the defensive depth bound.
    DepthExceeded {
        /// The depth at which decoding stopped.
        depth: usize,
    },
}

impl ExtractError {
    /// Create a new format error.
    ///
    /// # Arguments
    /// * `msg` - The error message.
    ///
    /// # Returns
    /// An `ExtractError` instance representing a structural format error.
    pub fn format_error(msg: &str) -> Self {
        ExtractError::Format {
            msg: msg.to_string(),
        }
    }

    /// Create a new decompression error.
    ///
    /// # Arguments
    /// * `msg` - The error message.
    ///
    /// # Returns
    /// An `ExtractError` instance representing a decompression failure.
    pub fn decompress_error(msg: &str) -> Self {
        ExtractError::Decompress {
            msg: msg.to_string(),
        }
    }

    /// Create a new decryption error.
    ///
    /// # Arguments
    /// * `msg` - The error message.
    ///
    /// # Returns
    /// An `ExtractError` instance representing a decryption failure.
    pub fn decrypt_error(msg: &str) -> Self {
        ExtractError::Decrypt {
            msg: msg.to_string(),
        }
    }

    /// Create a new missing-key error.
    ///
    /// # Arguments
    /// * `context` - A description of the item that needed the key.
    ///
    /// # Returns
    /// An `ExtractError` instance representing a missing public key.
    pub fn missing_key(context: &str) -> Self {
        ExtractError::MissingKey {
            context: context.to_string(),
        }
    }

    /// Create a new truncated-data error for an out-of-bounds section slice.
    ///
    /// # Arguments
    /// * `offset` - The declared section offset.
    /// * `length` - The declared section length.
    /// * `available` - The number of bytes actually available.
    ///
    /// # Returns
    /// An `ExtractError` instance representing truncated section data.
    pub fn truncated(offset: u64, length: u64, available: u64) -> Self {
        ExtractError::Truncated {
            offset,
            length,
            available,
        }
    }
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io { error_type, msg } => {
                write!(f, "IO {} Error: {}", error_type, msg)
            }
            ExtractError::Format { msg } => write!(f, "Format Error: {}", msg),
            ExtractError::MissingKey { context } => {
                write!(f, "Missing Key Error: no public key resolved for {}", context)
            }
            ExtractError::Decompress { msg } => write!(f, "Decompress Error: {}", msg),
            ExtractError::Decrypt { msg } => write!(f, "Decrypt Error: {}", msg),
            ExtractError::Truncated {
                offset,
                length,
                available,
            } => write!(
                f,
                "Truncated Data Error: section at {:#x}+{:#x} exceeds image of {:#x} bytes",
                offset, length, available
            ),
            ExtractError::DepthExceeded { depth } => {
                write!(f, "Depth Error: module nesting exceeded bound at depth {}", depth)
            }
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(error: std::io::Error) -> Self {
        ExtractError::Io {
            error_type: error.kind().to_string(),
            msg: error.to_string(),
        }
    }
}

impl From<goblin::error::Error> for ExtractError {
    fn from(error: goblin::error::Error) -> Self {
        ExtractError::Format {
            msg: format!("PE parse failed: {}", error),
        }
    }
}

impl From<rsa::Error> for ExtractError {
    fn from(error: rsa::Error) -> Self {
        ExtractError::Decrypt {
            msg: format!("RSA key rejected: {}", error),
        }
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(error: serde_json::Error) -> Self {
        ExtractError::Io {
            error_type: "Serialization".to_string(),
            msg: error.to_string(),
        }
    }
}
