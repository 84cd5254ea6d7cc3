use std::process::ExitCode;

fn main() -> ExitCode {
    gaffer_cli::run()
}
