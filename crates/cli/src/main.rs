use std::process::ExitCode;

fn main() -> ExitCode {
    slotbook_cli::run()
}
