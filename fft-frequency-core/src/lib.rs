// fft-frequency-core/src/lib.rs

//! The core logic for the live frequency detector.
//! This crate turns blocks of raw microphone PCM into detected
//! fundamental-frequency values: windowing, preprocessing, two
//! interchangeable pitch estimators and loudness/band gating.
//! It is completely headless and contains no UI code.

pub mod audio;
pub mod config;
pub mod frame;
pub mod pipeline;
pub mod pitch;
pub mod session;
pub mod window;

pub use config::{ConfigUpdate, EngineConfig, DEFAULT_SAMPLE_RATE};
pub use pitch::Estimator;
pub use session::{CaptureSession, ListenerId};

use std::fmt;

/// Errors produced by the detection core.
///
/// Nothing here is fatal to a running capture loop: configuration errors are
/// rejected before they take effect, and a mismatched sample block is simply
/// dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A configuration value failed validation (non-power-of-two FFT size,
    /// degenerate frequency band, frame size below 2, ...).
    InvalidConfiguration(String),
    /// A sample block's length disagrees with the configured frame size.
    SizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidConfiguration(reason) => {
                write!(f, "invalid configuration: {}", reason)
            }
            EngineError::SizeMismatch { expected, actual } => {
                write!(
                    f,
                    "frame size mismatch: expected {} samples, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for EngineError {}
