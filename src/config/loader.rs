//! Configuration loading: `config.json` if present, else code defaults, with
//! a `PORT` environment override.

use super::types::Config;

const CONFIG_FILE: &str = "config.json";

/// Load configuration from `config.json` in the working directory when it
/// exists; otherwise fall back to code defaults. A malformed file is
/// reported and ignored rather than aborting startup.
pub fn load() -> Config {
    let mut config = match std::fs::read_to_string(CONFIG_FILE) {
        Ok(raw) => match serde_json::from_str::<Config>(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("Ignoring malformed {CONFIG_FILE}: {e}");
                Config::default()
            }
        },
        Err(_) => Config::default(),
    };

    if let Ok(port) = std::env::var("PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.port = port,
            Err(_) => eprintln!("Ignoring non-numeric PORT={port}"),
        }
    }

    config
}
