use std::process::ExitCode;

fn main() -> ExitCode {
    smartcrop_cli::run()
}
