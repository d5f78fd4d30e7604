//! # Capture Session Module
//!
//! Owns the capture lifecycle: the cpal input stream, the dedicated analysis
//! worker and the listener registry. The worker receives raw PCM chunks from
//! the stream callback, frames them at the configured FFT size, runs each
//! frame through the detection pipeline to completion and fans detected
//! frequencies out to every registered listener. One session, one worker; no
//! process-wide capture state.

use crate::audio;
use crate::config::{ConfigUpdate, EngineConfig, DEFAULT_SAMPLE_RATE};
use crate::pipeline;
use crate::pitch::Estimator;
use crate::window;
use crate::EngineError;

use anyhow::{anyhow, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Maximum raw chunks buffered between the stream callback and the worker.
const RAW_CHANNEL_CAPACITY: usize = 8;

/// Handle identifying a registered frequency listener.
pub type ListenerId = usize;

type Listener = Box<dyn Fn(f32) + Send + 'static>;
type ListenerRegistry = Mutex<Vec<(ListenerId, Listener)>>;

/// State shared with the worker: replaced atomically by updates, read as one
/// snapshot per frame, so the related threshold fields can never tear.
#[derive(Debug, Clone)]
struct SharedState {
    config: EngineConfig,
    estimator: Option<Estimator>,
}

/// Worker-thread management: shutdown signal plus join handle.
struct CaptureWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

/// An owned capture session with an explicit start/stop lifecycle, a live
/// configuration and a dynamic listener registry.
pub struct CaptureSession {
    state: Arc<Mutex<SharedState>>,
    listeners: Arc<ListenerRegistry>,
    next_listener_id: AtomicUsize,
    target_sample_rate: u32,
    worker: Option<CaptureWorker>,
}

impl CaptureSession {
    /// Creates a session with the given configuration.
    ///
    /// # Errors
    /// * `InvalidConfiguration` if the configuration fails validation
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(SharedState {
                config,
                estimator: None,
            })),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicUsize::new(0),
            target_sample_rate: DEFAULT_SAMPLE_RATE,
            worker: None,
        })
    }

    /// Registers a listener. Every detected frequency is delivered to every
    /// registered listener.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(f32) + Send + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Applies a partial configuration update.
    ///
    /// The merged configuration is validated before it replaces the current
    /// one; on error the prior configuration stays in effect. The worker
    /// snapshots the state once per frame, so the replacement is atomic from
    /// its perspective.
    ///
    /// # Errors
    /// * `InvalidConfiguration` if the merged configuration fails validation
    pub fn update_configuration(&self, update: &ConfigUpdate) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.config = state.config.with_update(update)?;
        eprintln!("[SESSION] Configuration updated: {:?}", state.config);
        Ok(())
    }

    /// Overrides the estimation strategy; `None` restores the per-size
    /// default (frequency-domain from 2048 samples up).
    pub fn set_estimator(&self, estimator: Option<Estimator>) {
        self.state.lock().unwrap().estimator = estimator;
    }

    /// Snapshot of the current configuration.
    pub fn configuration(&self) -> EngineConfig {
        self.state.lock().unwrap().config.clone()
    }

    /// Whether a capture worker is currently running.
    pub fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts capture. A no-op while already capturing.
    ///
    /// The input stream is created on the worker thread and stays there
    /// until shutdown; the negotiated sample rate is handed back over a
    /// one-shot channel, so a device failure surfaces here instead of being
    /// logged and lost on the worker.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            eprintln!("[SESSION] start() called while already capturing; ignoring");
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let listeners = Arc::clone(&self.listeners);
        let target_rate = self.target_sample_rate;
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let thread_handle = thread::spawn(move || {
            let (raw_tx, raw_rx) = crossbeam_channel::bounded::<Vec<i16>>(RAW_CHANNEL_CAPACITY);

            let (stream, sample_rate) = match audio::start_audio_capture(raw_tx, target_rate) {
                Ok(tuple) => tuple,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(sample_rate));

            run_capture_loop(&raw_rx, &shutdown_rx, &state, &listeners, sample_rate);

            eprintln!("[WORKER] Releasing the audio device...");
            if let Err(e) = stream.pause() {
                eprintln!("[WORKER] Error pausing stream: {}", e);
            }
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => {
                eprintln!("[SESSION] Capture started at {} Hz", sample_rate);
                self.worker = Some(CaptureWorker {
                    shutdown_tx,
                    thread_handle: Some(thread_handle),
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(anyhow!("capture worker exited before reporting readiness"))
            }
        }
    }

    /// Stops capture and releases the audio device. Idempotent.
    ///
    /// Returns once the worker has observed the stop signal and exited; at
    /// most the frame already in flight is still processed.
    pub fn stop(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        eprintln!("[SESSION] Stopping capture...");
        let _ = worker.shutdown_tx.send(());
        if let Some(handle) = worker.thread_handle.take() {
            if handle.join().is_err() {
                eprintln!("[SESSION] Capture worker panicked during shutdown");
            }
        }
        eprintln!("[SESSION] Capture stopped");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The sequential frame loop: receive raw chunks, frame them at the current
/// FFT size, run the pipeline, fan out detections. One frame is processed to
/// completion before the next receive, so a slow listener delays the next
/// frame but never the device callback.
fn run_capture_loop(
    raw_rx: &Receiver<Vec<i16>>,
    shutdown_rx: &Receiver<()>,
    state: &Mutex<SharedState>,
    listeners: &ListenerRegistry,
    sample_rate: u32,
) {
    let mut pending: Vec<i16> = Vec::new();
    let mut window: Option<Arc<[f32]>> = None;

    loop {
        crossbeam_channel::select! {
            recv(raw_rx) -> msg => match msg {
                Ok(chunk) => {
                    pending.extend_from_slice(&chunk);
                    process_pending(&mut pending, &mut window, state, listeners, sample_rate);
                }
                Err(_) => {
                    eprintln!("[WORKER] Audio channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                eprintln!("[WORKER] Received shutdown signal");
                break;
            }
        }
    }
}

/// Frames the pending samples at the configured size and analyzes every
/// complete frame. The shared state is snapshotted once per frame; the
/// window is recomputed when the frame size changes.
fn process_pending(
    pending: &mut Vec<i16>,
    window: &mut Option<Arc<[f32]>>,
    state: &Mutex<SharedState>,
    listeners: &ListenerRegistry,
    sample_rate: u32,
) {
    loop {
        let snapshot = state.lock().unwrap().clone();
        let fft_size = snapshot.config.fft_size;
        if pending.len() < fft_size {
            return;
        }

        let current_window = match window {
            Some(w) if w.len() == fft_size => Arc::clone(w),
            _ => match window::hann_window(fft_size) {
                Ok(w) => {
                    *window = Some(Arc::clone(&w));
                    w
                }
                Err(e) => {
                    // Unreachable for a validated configuration.
                    eprintln!("[WORKER] Window generation failed: {}", e);
                    pending.drain(..fft_size);
                    continue;
                }
            },
        };

        let raw_frame: Vec<i16> = pending.drain(..fft_size).collect();
        let estimator = snapshot
            .estimator
            .unwrap_or_else(|| Estimator::default_for(fft_size));

        match pipeline::analyze_frame(
            &raw_frame,
            &current_window,
            &snapshot.config,
            estimator,
            sample_rate as f32,
        ) {
            Ok(Some(frequency)) => notify_listeners(listeners, frequency),
            Ok(None) => {} // quiet frame, no pitch, or outside the band
            Err(e) => eprintln!("[WORKER] Dropped frame: {}", e),
        }
    }
}

/// Delivers one detected frequency to every registered listener. The
/// registry stays locked for the duration of the emission, so concurrent
/// add/remove calls cannot race the iteration.
fn notify_listeners(listeners: &ListenerRegistry, frequency: f32) {
    let listeners = listeners.lock().unwrap();
    for (_, listener) in listeners.iter() {
        listener(frequency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collected(session: &CaptureSession) -> (ListenerId, Arc<Mutex<Vec<f32>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let id = session.add_listener(move |hz| sink.lock().unwrap().push(hz));
        (id, received)
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let mut session = CaptureSession::new(EngineConfig::default()).unwrap();
        assert!(!session.is_capturing());
        session.stop();
        session.stop();
        assert!(!session.is_capturing());
    }

    #[test]
    fn rejected_update_leaves_prior_configuration_in_effect() {
        let session = CaptureSession::new(EngineConfig::default()).unwrap();
        let before = session.configuration();

        let update = ConfigUpdate {
            fft_size: Some(4000), // not a power of two
            low_pass_hz: Some(800.0),
            ..ConfigUpdate::default()
        };
        assert!(matches!(
            session.update_configuration(&update),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert_eq!(session.configuration(), before);
    }

    #[test]
    fn accepted_update_replaces_all_named_fields() {
        let session = CaptureSession::new(EngineConfig::default()).unwrap();
        let update = ConfigUpdate {
            fft_size: Some(2048),
            high_pass_hz: Some(50.0),
            low_pass_hz: Some(1000.0),
            ..ConfigUpdate::default()
        };
        session.update_configuration(&update).unwrap();
        let config = session.configuration();
        assert_eq!(config.fft_size, 2048);
        assert_eq!(config.high_pass_hz, 50.0);
        assert_eq!(config.low_pass_hz, 1000.0);
        // Unnamed fields keep their defaults.
        assert_eq!(config.amplitude_threshold, 0.02);
    }

    #[test]
    fn removed_listeners_receive_nothing() {
        let session = CaptureSession::new(EngineConfig::default()).unwrap();
        let (first_id, first) = collected(&session);
        let (_second_id, second) = collected(&session);

        notify_listeners(&session.listeners, 220.0);
        assert!(session.remove_listener(first_id));
        assert!(!session.remove_listener(first_id));
        notify_listeners(&session.listeners, 330.0);

        assert_eq!(*first.lock().unwrap(), vec![220.0]);
        assert_eq!(*second.lock().unwrap(), vec![220.0, 330.0]);
    }

    #[test]
    fn worker_framing_emits_a_gated_tone() {
        let config = EngineConfig::default();
        let fft_size = config.fft_size;
        let state = Mutex::new(SharedState {
            config,
            estimator: None,
        });
        let listeners: ListenerRegistry = Mutex::new(Vec::new());
        let received = Arc::new(Mutex::new(Vec::<f32>::new()));
        let sink = Arc::clone(&received);
        listeners
            .lock()
            .unwrap()
            .push((0, Box::new(move |hz| sink.lock().unwrap().push(hz)) as Listener));

        // Two full frames of a 220 Hz tone plus a partial leftover.
        let sample_rate = 44100.0f32;
        let mut pending: Vec<i16> = (0..fft_size * 2 + 100)
            .map(|i| {
                let t = i as f32 / sample_rate;
                ((2.0 * std::f32::consts::PI * 220.0 * t).sin() * i16::MAX as f32) as i16
            })
            .collect();
        let mut window = None;

        process_pending(&mut pending, &mut window, &state, &listeners, 44100);

        // The leftover partial frame stays pending.
        assert_eq!(pending.len(), 100);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        // Default calibration subtracts 1 Hz from the raw estimate.
        for &hz in received.iter() {
            assert!((hz - 219.0).abs() < 5.0, "emitted {}", hz);
        }
    }

    #[test]
    fn silent_frames_are_never_emitted() {
        let state = Mutex::new(SharedState {
            config: EngineConfig::default(),
            estimator: None,
        });
        let listeners: ListenerRegistry = Mutex::new(Vec::new());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        listeners
            .lock()
            .unwrap()
            .push((0, Box::new(move |hz| sink.lock().unwrap().push(hz)) as Listener));

        let mut pending = vec![0i16; 4096 * 3];
        let mut window = None;
        process_pending(&mut pending, &mut window, &state, &listeners, 44100);

        assert!(pending.is_empty());
        assert!(received.lock().unwrap().is_empty());
    }
}
