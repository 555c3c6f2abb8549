use clap::{CommandFactory, FromArgMatches};

mod cli;
pub mod exit_codes;
mod experimental;

use cli::args::Cli;
use cli::commands::dispatch;
use exit_codes::EXIT_FAILURE;
use experimental::Experimental;

/// Experimental args of `seal verify` (clap ids).
const EXPERIMENTAL_VERIFY_ARGS: [&str; 2] = ["oci_layout", "scope"];

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let experimental = Experimental::from_env();
    let command = experimental.hide_flags(Cli::command(), "verify", &EXPERIMENTAL_VERIFY_ARGS);
    let cli = match Cli::from_arg_matches(&command.get_matches()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    env_logger::Builder::new()
        .parse_filters(cli.log_filter())
        .parse_default_env()
        .init();

    let code = match dispatch(cli, experimental).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
