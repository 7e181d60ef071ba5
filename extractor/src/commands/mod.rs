//! CLI subcommand implementations and top-level dispatch wiring.

pub mod base;
pub mod extract;
