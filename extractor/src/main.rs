//! Extractor binary entrypoint.
//!
//! Parses CLI arguments and dispatches to command handlers in the
//! `extractor` crate. The binary is intentionally a thin wrapper: argument
//! parsing and dispatch happen here, while the real work (file reading,
//! decoding, report serialization) is performed by the command
//! implementations found in `extractor::commands`.
//!
//! Examples
//!
//! Decode a sample and print the configuration report as JSON:
//!
//! $ extractor extract -f sample.bin
//!
//! The command above will:
//! 1. Read `sample.bin` (a flat memory dump, a disk-layout PE, or a
//!    stripped module).
//! 2. Locate and decode the embedded configuration container, recursing
//!    into any embedded modules.
//! 3. Print the reassembled configuration and collected diagnostics as a
//!    single JSON document on stdout.
//!
//! Pretty-print and write the report to a file instead:
//!
//! $ extractor extract -f sample.bin --pretty -o report.json
//!
//! Notes
//! - Logging goes to stderr via `env_logger`; set RUST_LOG=debug to watch
//!   individual sections decode.
//!
//! See `extractor::commands::base::Cli` and `extractor::commands::extract`
//! for more configuration options.

use clap::Parser;

fn main() -> extractor::error::Result<()> {
    env_logger::init();

    // Parse command-line arguments and execute the selected operation.
    extractor::commands::base::Cli::parse().handle()
}
