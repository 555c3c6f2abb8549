use super::args::*;

pub mod verify;

use crate::exit_codes::EXIT_SUCCESS;
use crate::experimental::Experimental;

pub async fn dispatch(cli: Cli, experimental: Experimental) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Verify(args) => verify::run(args, experimental).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(EXIT_SUCCESS)
        }
    }
}
