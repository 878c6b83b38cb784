use std::process::ExitCode;

fn main() -> ExitCode {
    efiling_cli::run()
}
