//! [`AudioBackend`] backed by the system's default input and output devices

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::capture::{AudioCapture, AudioCaptureConfig};
use super::{AudioBackend, CapturedAudio, playback};
use crate::error::{Error, Result};

/// A capture running on its own thread. CPAL streams are not `Send`, so the
/// thread owns the [`AudioCapture`] for its whole life.
struct ActiveCapture {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<CapturedAudio>,
}

impl ActiveCapture {
    fn finish(self) -> Result<CapturedAudio> {
        // a closed channel also stops the thread
        let _ = self.stop.send(());
        self.thread
            .join()
            .map_err(|_| Error::Audio("Capture thread panicked".to_string()))
    }
}

/// Microphone and speaker access through CPAL
pub struct DeviceAudio {
    config: AudioCaptureConfig,
    active: Mutex<Option<ActiveCapture>>,
}

impl DeviceAudio {
    pub fn new() -> Self {
        Self::with_config(AudioCaptureConfig::default())
    }

    pub fn with_config(config: AudioCaptureConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }
}

impl Default for DeviceAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for DeviceAudio {
    fn start_capture(&self) -> Result<()> {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            warn!("Capture already running, discarding it");
            previous.finish()?;
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let config = self.config.clone();

        let thread = thread::Builder::new()
            .name("recite-capture".to_string())
            .spawn(move || {
                let started = AudioCapture::with_config(config).and_then(|mut capture| {
                    capture.start()?;
                    Ok(capture)
                });

                let mut capture = match started {
                    Ok(capture) => {
                        let _ = ready_tx.send(Ok(()));
                        capture
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return CapturedAudio::new(Vec::new(), 0);
                    }
                };

                let _ = stop_rx.recv();
                capture.stop()
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!("Capture thread running");
                *active = Some(ActiveCapture {
                    stop: stop_tx,
                    thread,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::DeviceUnavailable(
                    "Capture thread exited before starting".to_string(),
                ))
            }
        }
    }

    fn stop_capture(&self) -> Result<CapturedAudio> {
        let active = self
            .active
            .lock()
            .take()
            .ok_or_else(|| Error::Audio("No capture in progress".to_string()))?;
        active.finish()
    }

    fn play(&self, wav: &[u8], cancel: &CancellationToken) -> Result<()> {
        playback::play_wav_blocking(wav, cancel)
    }
}

impl Drop for DeviceAudio {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            let _ = active.finish();
        }
    }
}
