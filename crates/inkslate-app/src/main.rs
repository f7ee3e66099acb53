//! Command-line entry point.
//!
//! Usage: `inkslate <script.json> <output.png> [config.json]`

use inkslate_app::{App, AppConfig, AppError, AppResult, Script};
use std::path::PathBuf;
use std::process::ExitCode;

fn run(args: &[String]) -> AppResult<()> {
    let [script_path, output, rest @ ..] = args else {
        return Err(AppError::Config(
            "usage: inkslate <script.json> <output.png> [config.json]".into(),
        ));
    };
    let config = match rest.first() {
        Some(path) => AppConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };
    let script = Script::from_json(&std::fs::read_to_string(script_path)?)?;

    let app = App::new(config)?;
    let stored = app.stored_pages()?;
    if !stored.is_empty() {
        log::info!("Stored pages: {}", stored.join(", "));
    }
    let frame = app.replay(&script)?;
    frame.write_png(&PathBuf::from(output))
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting inkslate");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("inkslate: {}", e);
            ExitCode::FAILURE
        }
    }
}
