//! # Windowing Module
//!
//! Generates the Hann window applied to every analysis frame before
//! estimation. The window is a pure function of its size, and the analysis
//! size rarely changes at runtime, so each distinct size is computed once
//! and cached for the lifetime of the process.

use crate::EngineError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Generated windows, keyed by size. Shared between the capture worker and
/// any direct callers.
static WINDOW_CACHE: Lazy<Mutex<HashMap<usize, Arc<[f32]>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the Hann window of the given size.
///
/// `w[i] = 0.5 * (1 - cos(2π·i / (size - 1)))`, so the first and last
/// coefficients are exactly zero. Deterministic; repeated calls for the same
/// size return the same shared coefficients.
///
/// # Errors
/// * `InvalidConfiguration` if `size < 2`
pub fn hann_window(size: usize) -> Result<Arc<[f32]>, EngineError> {
    if size < 2 {
        return Err(EngineError::InvalidConfiguration(format!(
            "window size must be at least 2, got {}",
            size
        )));
    }

    let mut cache = WINDOW_CACHE.lock().unwrap();
    if let Some(window) = cache.get(&size) {
        return Ok(Arc::clone(window));
    }

    let n_minus_1 = (size - 1) as f32;
    let window: Arc<[f32]> = (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect();
    cache.insert(size, Arc::clone(&window));
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_tapers_to_zero_at_the_edges() {
        let window = hann_window(1024).unwrap();
        assert_eq!(window[0], 0.0);
        assert_eq!(window[1023], 0.0);
        // The center of the window is close to unity gain.
        assert!((window[512] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn hann_window_is_idempotent() {
        let first = hann_window(256).unwrap();
        let second = hann_window(256).unwrap();
        assert_eq!(&first[..], &second[..]);
    }

    #[test]
    fn hann_window_coefficients_stay_in_unit_range() {
        let window = hann_window(128).unwrap();
        assert!(window.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }

    #[test]
    fn hann_window_rejects_degenerate_sizes() {
        assert!(matches!(
            hann_window(0),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            hann_window(1),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }
}
