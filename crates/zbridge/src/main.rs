use std::process::ExitCode;

fn main() -> ExitCode {
    match zbridge::run_bridge() {
        Ok(termination) => termination.exit_code(),
        Err(_) => ExitCode::FAILURE,
    }
}
