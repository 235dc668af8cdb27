//! Writes the HTTP API's OpenAPI document.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json

use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use utoipa::OpenApi;
use weather_readings::api::handlers::ApiDoc;

fn output_path(args: &[String]) -> Option<PathBuf> {
    args.windows(2)
        .find(|w| w[0] == "--output")
        .map(|w| PathBuf::from(&w[1]))
}

fn main() -> ExitCode {
    let json = match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialise OpenAPI document: {e}");
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = env::args().collect();
    let written = match output_path(&args) {
        Some(path) => fs::write(&path, &json).map(|()| {
            eprintln!("OpenAPI document written to {}", path.display());
        }),
        None => io::stdout().write_all(json.as_bytes()),
    };

    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to write OpenAPI document: {e}");
            ExitCode::FAILURE
        }
    }
}
