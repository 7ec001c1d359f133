use std::process::ExitCode;

fn main() -> ExitCode {
    match cocodump::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
