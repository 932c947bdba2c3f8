use std::process::ExitCode;

fn main() -> ExitCode {
    redress_cli::run()
}
