//! podrelayd - notification relay daemon

use std::process::ExitCode;

fn main() -> ExitCode {
    podrelayd::cli::main()
}
