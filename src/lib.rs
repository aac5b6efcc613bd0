pub mod algorithm;
pub mod commands;
pub mod models;
pub mod page;
pub mod player;
pub mod session;
pub mod telemetry;

use std::path::Path;

use commands::replay::replay_file;

const USAGE: &str = "usage: scrollscrub <script.json> [config.json]";

/// Replays a script and prints the JSON report to stdout.
pub fn run(args: &[String]) -> Result<(), String> {
    let (script, config) = match args {
        [script] => (script, None),
        [script, config] => (script, Some(config)),
        _ => return Err(USAGE.to_string()),
    };

    let report = replay_file(Path::new(script), config.map(Path::new))
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("Failed to encode replay report: {e}"))?;
    println!("{json}");
    Ok(())
}
