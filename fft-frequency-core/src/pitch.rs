//! # Pitch Estimation Module
//!
//! Two interchangeable fundamental-frequency estimators over one windowed
//! analysis frame:
//!
//! - a time-domain method computing a YIN-style cumulative mean normalized
//!   difference function (CMNDF) over lag values, and
//! - a frequency-domain method picking the dominant FFT bin and refining it
//!   with parabolic interpolation.
//!
//! The systems this engine descends from carried both without reconciling
//! them, so they are exposed here as alternative strategies behind
//! [`Estimator`]. Neither looks beyond the current frame.

use rustfft::{num_complex::Complex, FftPlanner};

/// Absolute CMNDF threshold for the time-domain lag search.
const CMNDF_THRESHOLD: f32 = 0.15;

/// Selects which estimation strategy the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    /// YIN-style difference-function search. Quadratic in the frame size,
    /// which bounds the usable frame size for real-time operation.
    TimeDomain,
    /// FFT peak picking with sub-bin interpolation. O(N log N); preferred
    /// for larger frames where the time-domain cost becomes prohibitive.
    FrequencyDomain,
}

impl Estimator {
    /// The default strategy for a given analysis size: frequency-domain from
    /// 2048 samples up, time-domain below.
    pub fn default_for(fft_size: usize) -> Self {
        if fft_size >= 2048 {
            Estimator::FrequencyDomain
        } else {
            Estimator::TimeDomain
        }
    }

    /// Runs the selected strategy on a windowed frame.
    pub fn estimate(self, frame: &[f32], sample_rate: f32) -> Option<f32> {
        match self {
            Estimator::TimeDomain => detect_pitch_yin(frame, sample_rate),
            Estimator::FrequencyDomain => detect_pitch_spectrum(frame, sample_rate),
        }
    }
}

/// Time-domain pitch estimation via the cumulative mean normalized
/// difference function.
///
/// Scans lags for the first CMNDF dip below a fixed threshold and walks
/// forward to the bottom of that dip, so the estimate settles on a local
/// minimum instead of the first noisy crossing. When no lag clears the
/// threshold the global minimum is used, so a best-effort value comes back
/// even for atonal input.
///
/// Returns `None` when the frame is too short to form a lag estimate or
/// carries no energy at all.
pub fn detect_pitch_yin(frame: &[f32], sample_rate: f32) -> Option<f32> {
    let tau_max = frame.len() / 2;
    if tau_max < 2 {
        return None;
    }

    // A frame with no energy has no pitch. Its CMNDF is all ones (the
    // running sum never becomes positive), so the global-minimum fallback
    // would otherwise report the sample rate itself.
    if frame.iter().all(|&sample| sample == 0.0) {
        return None;
    }

    let cmndf = cumulative_mean_normalized_difference(frame);

    let mut tau_estimate = None;
    for tau in 1..tau_max {
        if cmndf[tau] < CMNDF_THRESHOLD {
            let mut local_tau = tau;
            while local_tau + 1 < tau_max && cmndf[local_tau + 1] < cmndf[local_tau] {
                local_tau += 1;
            }
            tau_estimate = Some(local_tau);
            break;
        }
    }

    // Global-minimum fallback when nothing clears the threshold.
    let tau_estimate = tau_estimate.unwrap_or_else(|| {
        let mut best = 1;
        for tau in 2..tau_max {
            if cmndf[tau] < cmndf[best] {
                best = tau;
            }
        }
        best
    });

    Some(sample_rate / tau_estimate as f32)
}

/// Computes the squared-difference function over lags `[0, N/2)` and
/// normalizes it to the cumulative mean form. `cmndf[0]` is 1 by definition;
/// lags whose running sum is still zero are also reported as 1.
fn cumulative_mean_normalized_difference(frame: &[f32]) -> Vec<f32> {
    let tau_max = frame.len() / 2;
    let mut difference = vec![0.0f32; tau_max];
    for tau in 1..tau_max {
        let mut sum = 0.0f32;
        for j in 0..frame.len() - tau {
            let delta = frame[j] - frame[j + tau];
            sum += delta * delta;
        }
        difference[tau] = sum;
    }

    let mut cmndf = vec![0.0f32; tau_max];
    cmndf[0] = 1.0;
    let mut running_sum = 0.0f32;
    for tau in 1..tau_max {
        running_sum += difference[tau];
        cmndf[tau] = if running_sum > 0.0 {
            difference[tau] * tau as f32 / running_sum
        } else {
            1.0
        };
    }
    cmndf
}

/// Frequency-domain pitch estimation via FFT peak picking.
///
/// Takes the magnitude spectrum of the frame, finds the dominant bin over
/// the first N/2 bins (excluding DC) and refines it with parabolic
/// interpolation across the neighboring magnitudes, recovering sub-bin
/// resolution the discrete grid alone cannot provide.
pub fn detect_pitch_spectrum(frame: &[f32], sample_rate: f32) -> Option<f32> {
    let size = frame.len();
    let half = size / 2;
    if half < 2 {
        return None;
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);

    let mut buffer: Vec<Complex<f32>> = frame
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .collect();
    fft.process(&mut buffer);

    let magnitudes: Vec<f32> = buffer.iter().take(half).map(|c| c.norm()).collect();

    // Dominant bin, excluding DC.
    let mut peak_bin = 1;
    for (bin, &magnitude) in magnitudes.iter().enumerate().skip(2) {
        if magnitude > magnitudes[peak_bin] {
            peak_bin = bin;
        }
    }

    // A zero peak means the spectrum is empty; there is no dominant
    // component to report.
    if magnitudes[peak_bin] <= 0.0 {
        return None;
    }

    let refined_bin = if peak_bin + 1 < half {
        peak_bin as f32
            + interpolate_peak(
                magnitudes[peak_bin - 1],
                magnitudes[peak_bin],
                magnitudes[peak_bin + 1],
            )
    } else {
        peak_bin as f32
    };

    Some(refined_bin * sample_rate / size as f32)
}

/// Parabolic-interpolation offset for a peak with the given neighboring
/// magnitudes. Zero for a symmetric peak, and zero when the three points are
/// degenerate (flat top).
fn interpolate_peak(left: f32, center: f32, right: f32) -> f32 {
    let denominator = 2.0 * center - left - right;
    if denominator.abs() < f32::EPSILON {
        0.0
    } else {
        0.5 * (right - left) / denominator
    }
}
