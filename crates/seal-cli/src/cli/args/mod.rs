use clap::{Parser, Subcommand};

pub mod common;
pub mod verify;
pub use common::*;
pub use verify::*;

#[derive(Parser, Debug)]
#[command(
    name = "seal",
    version,
    about = "Verify signatures of OCI artifacts against a local trust policy"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Verify(VerifyArgs),
    /// Print the seal version
    Version,
}

impl Cli {
    /// Default log filter of the selected command.
    pub fn log_filter(&self) -> &'static str {
        match &self.cmd {
            Command::Verify(args) => args.logging.filter(),
            Command::Version => "warn",
        }
    }
}
