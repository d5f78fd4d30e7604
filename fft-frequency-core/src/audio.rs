//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! The capture contract is mono signed 16-bit PCM at a target sample rate
//! (44.1 kHz by default). The stream callback only forwards raw sample
//! chunks; framing to the configured analysis size happens in the session
//! worker, which is the single reader of the live configuration.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;

/// Starts audio capture from the default input device.
///
/// Selects the default input device, picks the supported mono i16
/// configuration whose rate range is closest to `target_rate`, and plays an
/// input stream whose callback forwards raw sample chunks through `sender`.
/// Chunks are sent with `try_send`: when the analysis worker falls behind,
/// new chunks are dropped instead of buffered without bound.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - the stream handle (capture stops when it
///   is paused and dropped) and the negotiated sample rate
/// * `Err(e)` - no device, no suitable format, or stream setup failure
pub fn start_audio_capture(
    sender: Sender<Vec<i16>>,
    target_rate: u32,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    eprintln!("[AUDIO] Using input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable mono i16 input format found"))?;

    // The closest-range config may still not contain the target rate.
    let sample_rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));

    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    eprintln!("[AUDIO] Selected sample rate: {} Hz", sample_rate_val);

    let err_fn = |err| eprintln!("[AUDIO] An error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            // Forward the chunk; drop it if the worker is behind.
            let _ = sender.try_send(data.to_vec());
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Finds the supported configuration closest to the target sample rate.
///
/// Only mono i16 configurations qualify; among those, the one whose rate
/// range lies nearest the target wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::I16)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
