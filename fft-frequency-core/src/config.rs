//! # Configuration Module
//!
//! The engine configuration read by every frame's pipeline, plus the
//! partial-update form supplied by external callers. Field names serialize
//! in camelCase to match the external JSON contract (`fftSize`,
//! `highPassHz`, ...); missing fields keep their current values.

use crate::EngineError;
use serde::{Deserialize, Serialize};

/// Default capture sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// The complete detection-engine configuration.
///
/// Mutated only through [`EngineConfig::with_update`]; a replacement is
/// validated as a whole before it takes effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Analysis frame size in samples. Must be a power of two.
    pub fft_size: usize,
    /// Lower edge of the accepted frequency band, in Hz.
    pub high_pass_hz: f32,
    /// Upper edge of the accepted frequency band, in Hz.
    pub low_pass_hz: f32,
    /// Subtracted from every raw estimate before gating.
    pub calibration_offset_hz: f32,
    /// Minimum frame RMS; quieter frames are dropped without estimation.
    pub amplitude_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            high_pass_hz: 70.0,
            low_pass_hz: 400.0,
            calibration_offset_hz: 1.0,
            amplitude_threshold: 0.02,
        }
    }
}

impl EngineConfig {
    /// Validates every field.
    ///
    /// # Errors
    /// * `InvalidConfiguration` for a non-power-of-two or sub-2 `fft_size`,
    ///   a negative `high_pass_hz` or `amplitude_threshold`, or a band where
    ///   `low_pass_hz` does not exceed `high_pass_hz`
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(EngineError::InvalidConfiguration(format!(
                "fftSize must be a power of two of at least 2, got {}",
                self.fft_size
            )));
        }
        if !self.high_pass_hz.is_finite() || self.high_pass_hz < 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "highPassHz must be a non-negative number, got {}",
                self.high_pass_hz
            )));
        }
        if !self.low_pass_hz.is_finite() || self.low_pass_hz <= self.high_pass_hz {
            return Err(EngineError::InvalidConfiguration(format!(
                "lowPassHz ({}) must be greater than highPassHz ({})",
                self.low_pass_hz, self.high_pass_hz
            )));
        }
        if !self.calibration_offset_hz.is_finite() {
            return Err(EngineError::InvalidConfiguration(format!(
                "calibrationOffsetHz must be a finite number, got {}",
                self.calibration_offset_hz
            )));
        }
        if !self.amplitude_threshold.is_finite() || self.amplitude_threshold < 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "amplitudeThreshold must be a non-negative number, got {}",
                self.amplitude_threshold
            )));
        }
        Ok(())
    }

    /// Returns a new configuration with the update's present fields applied.
    ///
    /// The merged result is validated before it is returned, so a bad update
    /// can never replace a good configuration.
    pub fn with_update(&self, update: &ConfigUpdate) -> Result<EngineConfig, EngineError> {
        let merged = EngineConfig {
            fft_size: update.fft_size.unwrap_or(self.fft_size),
            high_pass_hz: update.high_pass_hz.unwrap_or(self.high_pass_hz),
            low_pass_hz: update.low_pass_hz.unwrap_or(self.low_pass_hz),
            calibration_offset_hz: update
                .calibration_offset_hz
                .unwrap_or(self.calibration_offset_hz),
            amplitude_threshold: update
                .amplitude_threshold
                .unwrap_or(self.amplitude_threshold),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// A partial configuration as supplied by an external caller.
///
/// Every field is optional; absent fields keep the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub fft_size: Option<usize>,
    pub high_pass_hz: Option<f32>,
    pub low_pass_hz: Option<f32>,
    pub calibration_offset_hz: Option<f32>,
    pub amplitude_threshold: Option<f32>,
}
