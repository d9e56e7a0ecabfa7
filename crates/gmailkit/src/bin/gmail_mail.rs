use std::process::ExitCode;

fn main() -> ExitCode {
    gmailkit::mail_cli::run(std::env::args_os())
}
