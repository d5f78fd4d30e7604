//! # fft-frequency console monitor
//!
//! Starts a capture session against the default microphone and prints every
//! detected frequency until Enter is pressed. An optional argument names a
//! JSON configuration file whose fields follow the engine's camelCase
//! contract (`fftSize`, `highPassHz`, `lowPassHz`, `calibrationOffsetHz`,
//! `amplitudeThreshold`); absent fields keep their defaults.

use anyhow::{Context, Result};
use fft_frequency_core::{CaptureSession, ConfigUpdate, EngineConfig};
use std::fs;
use std::io::BufRead;

fn main() -> Result<()> {
    let config = load_configuration()?;
    eprintln!("[MAIN] Configuration: {:?}", config);

    let mut session = CaptureSession::new(config)?;
    session.add_listener(|frequency| {
        println!("{:.2} Hz", frequency);
    });

    session.start()?;
    eprintln!("[MAIN] Listening... press Enter to stop");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    session.stop();
    eprintln!("[MAIN] Done");
    Ok(())
}

/// Builds the engine configuration from defaults plus an optional JSON
/// update file given as the first argument.
fn load_configuration() -> Result<EngineConfig> {
    let default = EngineConfig::default();
    match std::env::args().nth(1) {
        Some(path) => {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("reading configuration file {}", path))?;
            let update: ConfigUpdate = serde_json::from_str(&data)
                .with_context(|| format!("parsing configuration file {}", path))?;
            Ok(default.with_update(&update)?)
        }
        None => Ok(default),
    }
}
