use std::process::ExitCode;

fn main() -> ExitCode {
    threadcast_cli::run()
}
