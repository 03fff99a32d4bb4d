use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(truststore::cli::run(std::env::args_os()))
}
