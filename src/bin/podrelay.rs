//! podrelay - client for the relay daemon

use std::process::ExitCode;

fn main() -> ExitCode {
    podrelay_cli::cli::main()
}
