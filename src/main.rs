use std::process::ExitCode;

fn main() -> ExitCode {
    pocketcal::run()
}
