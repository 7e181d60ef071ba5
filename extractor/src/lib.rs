//! Library for decoding the encrypted configuration container embedded in
//! ISFB-family samples.
//!
//! This crate provides the core pieces used by the `extractor` binary:
//! - The `decoder` module drives a full decode: input sniffing, table
//!   location, descriptor walking, section dispatch and module recursion.
//! - The `locator`, `walker` and `sections` modules find and decode the
//!   XOR-obfuscated section table and classify its entries.
//! - The `depack`, `ciphers` and `pubkey` modules implement the payload
//!   transforms: aPLib decompression, the RSA public transform and
//!   Serpent-CBC decryption of key-protected sections.
//! - The `image` module maps disk-layout PE inputs into the flat virtual
//!   layout that section offsets address.
//! - The `ini` module parses the decrypted client-INI parameter array and
//!   the `report` module carries the structured result.
//! - The `error` module defines error types used across the library.
//!
//! The library exposes a small `CommandHandler` trait which CLI types
//! implement to perform their respective operation when invoked by the CLI
//! entrypoint.
//!
//! Design notes:
//! - Ownership is preferred for command handlers: `handle(self)` consumes
//!   the command struct so implementations can move resources (paths,
//!   buffers) without cloning.
//! - Payload transforms are kept separate from the decode pipeline so they
//!   can be reused and tested independently.
pub mod ciphers;
pub mod commands;
pub mod decoder;
pub mod depack;
pub mod error;
pub mod image;
pub mod ini;
pub mod locator;
pub mod pubkey;
pub mod report;
pub mod sections;
pub mod walker;

mod bytes;

pub use decoder::{Decoder, VersionFingerprint};
pub use report::DecodeOutput;

/// A thin abstraction implemented by CLI command structs to execute work.
///
/// Implementors should perform whatever IO or processing the command
/// represents inside `handle`. The method takes ownership of `self` so
/// implementors can move owned fields (file paths, configuration) without
/// requiring extra cloning.
///
/// Example use:
/// - Constructed by the `clap`-generated CLI parser and then dispatched
///   from `main`.
pub trait CommandHandler {
    /// Execute the command, consuming the implementor.
    fn handle(self) -> crate::error::Result<()>;
}
