use std::process::ExitCode;

fn main() -> ExitCode {
    match gitward::cli::run() {
        Ok(code) => code,
        Err(e) => {
            gitward::ui::output::error(format!("{:#}", e));
            ExitCode::from(1)
        }
    }
}
