//! # Frame Preprocessing Module
//!
//! Converts raw signed 16-bit PCM blocks into normalized, windowed
//! floating-point analysis frames, and measures frame loudness for the
//! silence gate.

use crate::EngineError;

/// Normalizes a raw PCM block to `[-1.0, 1.0]` and applies the window.
///
/// Each sample is divided by `i16::MAX` and multiplied by the matching
/// window coefficient.
///
/// # Errors
/// * `SizeMismatch` if the block length differs from the window length
pub fn preprocess(raw: &[i16], window: &[f32]) -> Result<Vec<f32>, EngineError> {
    if raw.len() != window.len() {
        return Err(EngineError::SizeMismatch {
            expected: window.len(),
            actual: raw.len(),
        });
    }

    Ok(raw
        .iter()
        .zip(window.iter())
        .map(|(&sample, &coefficient)| (sample as f32 / i16::MAX as f32) * coefficient)
        .collect())
}

/// Root-mean-square loudness of a frame.
///
/// Used purely as a gate against silent or low-energy frames, never for
/// normalization.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
