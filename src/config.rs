use clap::Parser;
use std::path::PathBuf;

/// Gradebook sidecar: newline-delimited JSON requests on stdin, one
/// response line per request on stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "registrod", version, about)]
pub struct Config {
    /// Workspace directory to open at startup instead of waiting for
    /// `workspace.select`.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Do not insert the default classes and subjects into an empty workspace
    #[arg(long)]
    pub no_seed: bool,

    /// Log filter directive, e.g. "registrod=debug". Overrides RUST_LOG.
    #[arg(long)]
    pub log: Option<String>,
}

impl Config {
    pub fn seed_defaults(&self) -> bool {
        !self.no_seed
    }
}
