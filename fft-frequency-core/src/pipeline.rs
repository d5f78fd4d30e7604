//! # Per-Frame Pipeline Module
//!
//! The complete path from one raw PCM block to an optional detected
//! frequency: preprocessing, loudness gate, pitch estimation, band gate.
//! Shared by the capture worker and the tests; holds no capture state of
//! its own.

use crate::config::EngineConfig;
use crate::frame;
use crate::pitch::Estimator;
use crate::EngineError;

/// Applies the calibration offset and the configured frequency band.
///
/// Returns the calibrated value only when it lies inside
/// `[high_pass_hz, low_pass_hz]`; both bounds are inclusive.
pub fn gate(raw_frequency: f32, config: &EngineConfig) -> Option<f32> {
    let calibrated = raw_frequency - config.calibration_offset_hz;
    if calibrated >= config.high_pass_hz && calibrated <= config.low_pass_hz {
        Some(calibrated)
    } else {
        None
    }
}

/// Runs one raw PCM block through the full detection pipeline.
///
/// `Ok(None)` is the normal no-detection outcome: the frame was too quiet,
/// the estimator found nothing, or the estimate fell outside the band. The
/// loudness gate runs before estimation; the band gate after, never before.
///
/// # Errors
/// * `SizeMismatch` if the block length disagrees with the window length
pub fn analyze_frame(
    raw: &[i16],
    window: &[f32],
    config: &EngineConfig,
    estimator: Estimator,
    sample_rate: f32,
) -> Result<Option<f32>, EngineError> {
    let samples = frame::preprocess(raw, window)?;

    if frame::rms(&samples) < config.amplitude_threshold {
        return Ok(None);
    }

    let Some(raw_frequency) = estimator.estimate(&samples, sample_rate) else {
        return Ok(None);
    };

    Ok(gate(raw_frequency, config))
}
