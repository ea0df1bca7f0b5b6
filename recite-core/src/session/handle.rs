//! Client side of a running practice session

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::state::{SessionCommand, SessionState};
use crate::error::{Error, Result};
use crate::types::PracticeDifficulty;

/// Sends commands to a session engine and observes its state.
///
/// Dropping the handle ends the session.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<SessionCommand>,
        state: watch::Receiver<SessionState>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            state,
            cancel,
            task,
        }
    }

    /// Queue a command for the engine
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    pub async fn start_recording(&self) -> Result<()> {
        self.send(SessionCommand::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<()> {
        self.send(SessionCommand::StopRecording).await
    }

    pub async fn play_prompt(&self) -> Result<()> {
        self.send(SessionCommand::PlayPrompt).await
    }

    pub async fn play_capture(&self) -> Result<()> {
        self.send(SessionCommand::PlayCapture).await
    }

    pub async fn stop_audio(&self) -> Result<()> {
        self.send(SessionCommand::StopAudio).await
    }

    pub async fn select_answer(&self, index: usize) -> Result<()> {
        self.send(SessionCommand::SelectAnswer(index)).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(SessionCommand::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(SessionCommand::Previous).await
    }

    pub async fn regenerate(&self, difficulty: Option<PracticeDifficulty>) -> Result<()> {
        self.send(SessionCommand::Regenerate { difficulty }).await
    }

    /// Latest published state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`, returning that state
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionState) -> bool,
    ) -> Result<SessionState> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(predicate)
            .await
            .map_err(|_| Error::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// End the session, cancelling in-flight requests and stopping audio
    pub async fn shutdown(self) {
        let Self {
            commands,
            cancel,
            task,
            ..
        } = self;

        cancel.cancel();
        let _ = commands.try_send(SessionCommand::Shutdown);
        if let Err(e) = task.await {
            warn!("Session task failed: {}", e);
        }
    }
}
