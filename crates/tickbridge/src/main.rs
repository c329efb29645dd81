use std::process::ExitCode;

fn main() -> ExitCode {
    match tickbridge::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("tickbridge: {error}");
            ExitCode::FAILURE
        }
    }
}
