//! Local speech synthesis used when the gateway cannot produce audio

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Speaking rate of the system voice at speed 1.0, in words per minute
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// A blocking, on-device text-to-speech voice
pub trait FallbackVoice: Send + Sync {
    /// Speak `text`, returning once it is finished or `cancel` fires
    fn speak(&self, text: &str, language: &str, speed: f32, cancel: &CancellationToken)
    -> Result<()>;
}

/// The platform speech command: `say` on macOS, espeak elsewhere
#[derive(Debug, Clone, Default)]
pub struct SystemVoice;

impl SystemVoice {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "macos")]
    fn spawn(&self, text: &str, _language: &str, wpm: u32) -> Result<Child> {
        Command::new("say")
            .arg("-r")
            .arg(wpm.to_string())
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::DeviceUnavailable(format!("Failed to run say: {e}")))
    }

    #[cfg(not(target_os = "macos"))]
    fn spawn(&self, text: &str, language: &str, wpm: u32) -> Result<Child> {
        let language = crate::content::normalize_language(language);
        let mut last_error = None;

        for program in ["espeak-ng", "espeak"] {
            let spawned = Command::new(program)
                .arg("-v")
                .arg(&language)
                .arg("-s")
                .arg(wpm.to_string())
                .arg(text)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();

            match spawned {
                Ok(child) => return Ok(child),
                Err(e) => {
                    debug!("{} unavailable: {}", program, e);
                    last_error = Some(e);
                }
            }
        }

        Err(Error::DeviceUnavailable(format!(
            "No system speech command available: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

impl FallbackVoice for SystemVoice {
    fn speak(
        &self,
        text: &str,
        language: &str,
        speed: f32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let wpm = words_per_minute(speed);
        info!("Speaking with system voice at {} wpm", wpm);

        let mut child = self.spawn(text, language, wpm)?;

        loop {
            if cancel.is_cancelled() {
                if let Err(e) = child.kill() {
                    warn!("Failed to stop system voice: {}", e);
                }
                let _ = child.wait();
                debug!("System voice stopped");
                return Ok(());
            }

            match child.try_wait()? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(Error::Audio(format!("System voice exited with {status}")));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

fn words_per_minute(speed: f32) -> u32 {
    (BASE_WORDS_PER_MINUTE * speed.clamp(0.25, 4.0)).round() as u32
}
