/*!
Extraction subcommand for the extractor CLI.

Reads a sample from disk, runs the full configuration decode and emits the
report as a JSON document, either on stdout or into a file. Diagnostics
collected during the decode travel inside the report; they are additionally
surfaced on the log so a quick run with RUST_LOG=warn shows what degraded.

The command implements `CommandHandler` and performs its work when
`handle()` is invoked by the top-level CLI dispatch.
*/

use clap::Args;
use std::path::PathBuf;

use crate::decoder::Decoder;
use crate::CommandHandler;

/// Configuration-extraction subcommand arguments.
///
/// The command reads the sample, decodes the embedded configuration
/// container (mapping PE inputs and recursing into embedded modules as
/// needed) and serializes the result with `serde_json`.
#[derive(Debug, Clone, Args)]
#[command(name = "extract")]
pub struct ExtractSubCommandArgs {
    /// Sample to decode (flat dump, disk-layout PE, or stripped module)
    #[arg(short = 'f', long = "file", required = true)]
    file_path: PathBuf,

    /// Pretty-print the JSON report
    #[arg(long = "pretty", default_value_t = false)]
    pretty: bool,

    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

impl CommandHandler for ExtractSubCommandArgs {
    /// Execute the extraction flow.
    ///
    /// 1. Read the sample from `file_path`.
    /// 2. Decode the configuration container.
    /// 3. Log every diagnostic the decode collected.
    /// 4. Serialize the report and write it to `output` or stdout.
    fn handle(self) -> crate::error::Result<()> {
        log::info!("reading sample {}", self.file_path.to_string_lossy());
        let data = std::fs::read(&self.file_path)?;

        let output = Decoder::new().decode(&data)?;
        for diagnostic in &output.diagnostics {
            log::warn!("{}: {}", diagnostic.context, diagnostic.message);
        }
        log::info!(
            "decoded {} configuration entries, {} diagnostics",
            output.config.len(),
            output.diagnostics.len()
        );

        let report = if self.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        match &self.output {
            Some(path) => std::fs::write(path, report)?,
            None => println!("{}", report),
        }

        Ok(())
    }
}
