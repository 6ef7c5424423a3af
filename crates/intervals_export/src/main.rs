use std::process::ExitCode;

use clap::Parser;
use intervals_export::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::init_tracing(cli.debug);

    let stdin = std::io::stdin();
    match cli::execute(&cli, stdin.lock(), std::io::stdout()).await {
        Ok(outcome) => {
            cli::report(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
