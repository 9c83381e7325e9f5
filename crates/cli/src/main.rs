use std::process::ExitCode;

fn main() -> ExitCode {
    threadmind_cli::run()
}
