use std::process::ExitCode;

fn main() -> ExitCode {
    match dosemate_lib::run() {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Home refresh failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
