pub mod cli;
pub mod diagnostics;
pub mod dispatch;
pub mod follow;
pub mod prompt;
pub mod render;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;
use crate::diagnostics::DiagnosticsSession;
use crate::prompt::DialoguerPromptDriver;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let diagnostics = DiagnosticsSession::initialize(cli.diagnostics)?;
    if let Some(path) = diagnostics.path() {
        eprintln!("Diagnostics enabled: {}", path.display());
    }
    diagnostics.record(format!("command={:?}", cli.command));

    let mut prompt = DialoguerPromptDriver::new();
    let result = dispatch::run_with_deps(cli.command, &mut prompt).await;
    if let Err(error) = &result {
        diagnostics.record(format!("error={error:#}"));
    }
    result
}
