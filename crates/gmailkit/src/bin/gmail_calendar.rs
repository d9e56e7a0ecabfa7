use std::process::ExitCode;

fn main() -> ExitCode {
    gmailkit::calendar_cli::run(std::env::args_os())
}
