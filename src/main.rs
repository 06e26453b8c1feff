use std::process::ExitCode;

use colored::Colorize;

fn main() -> ExitCode {
    match tokendesk::app::run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
