//! Ingredient text box fed by the keyboard and by a speech-to-text capability.
//!
//! Both sources are consumed by a single task, one update at a time, so a
//! dictated chunk can never interleave with a keyboard edit. While listening
//! the buffer is append-only and keyboard edits are refused.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 32;

/// Signals emitted by a running speech capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Transcript(String),
    Error(String),
    Ended,
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),
    #[error("no more dictation available")]
    Exhausted,
    #[error("failed to read transcript {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("input box has shut down")]
    Closed,
}

#[async_trait]
pub trait SpeechCapability: Send {
    /// Starts a recognition session and returns its event stream.
    async fn start(&mut self) -> Result<mpsc::Receiver<VoiceEvent>, VoiceError>;

    async fn stop(&mut self);
}

/// Observable state of the input box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    pub text: String,
    pub listening: bool,
    /// Voice start requests handled so far.
    pub voice_sessions: usize,
}

#[derive(Debug)]
enum InputUpdate {
    Keyboard(String),
    StartVoice,
    StopVoice,
}

enum Next {
    Update(Option<InputUpdate>),
    Voice(VoiceEvent),
}

pub struct InputBox {
    updates: mpsc::Sender<InputUpdate>,
    snapshot: watch::Receiver<InputSnapshot>,
    task: JoinHandle<String>,
}

impl InputBox {
    pub fn spawn<C: SpeechCapability + 'static>(capability: C) -> Self {
        let (updates, rx) = mpsc::channel(EVENT_BUFFER);
        let (snapshot_tx, snapshot) = watch::channel(InputSnapshot::default());
        let task = tokio::spawn(run(capability, rx, snapshot_tx));
        Self {
            updates,
            snapshot,
            task,
        }
    }

    /// Replaces the text, as typing into the box does. Ignored while listening.
    pub async fn type_text(&self, text: impl Into<String>) -> Result<(), VoiceError> {
        self.send(InputUpdate::Keyboard(text.into())).await
    }

    pub async fn start_voice(&self) -> Result<(), VoiceError> {
        self.send(InputUpdate::StartVoice).await
    }

    pub async fn stop_voice(&self) -> Result<(), VoiceError> {
        self.send(InputUpdate::StopVoice).await
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InputSnapshot> {
        self.snapshot.clone()
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&InputSnapshot) -> bool,
    ) -> Result<InputSnapshot, VoiceError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx.wait_for(predicate).await.map_err(|_| VoiceError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Waits until at least one voice session was requested and listening
    /// has stopped, by error, exhaustion or an explicit stop.
    pub async fn wait_until_idle(&self) -> Result<InputSnapshot, VoiceError> {
        self.wait_for(|s| s.voice_sessions > 0 && !s.listening).await
    }

    /// Shuts the box down and returns the final text.
    pub async fn finish(self) -> Result<String, VoiceError> {
        drop(self.updates);
        self.task.await.map_err(|_| VoiceError::Closed)
    }

    async fn send(&self, update: InputUpdate) -> Result<(), VoiceError> {
        self.updates.send(update).await.map_err(|_| VoiceError::Closed)
    }
}

#[derive(Debug, Default)]
struct TextBuffer {
    text: String,
    listening: bool,
    voice_sessions: usize,
}

impl TextBuffer {
    fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            text: self.text.clone(),
            listening: self.listening,
            voice_sessions: self.voice_sessions,
        }
    }

    fn replace(&mut self, text: String) {
        if self.listening {
            debug!("keyboard edit ignored while listening");
            return;
        }
        self.text = text;
    }

    fn append_transcript(&mut self, chunk: &str) {
        if !self.listening {
            return;
        }
        let joined = format!("{} {}", self.text, chunk);
        self.text = joined.trim().to_string();
    }
}

async fn next_voice_event(voice: &mut Option<mpsc::Receiver<VoiceEvent>>) -> VoiceEvent {
    match voice {
        Some(rx) => rx.recv().await.unwrap_or(VoiceEvent::Ended),
        None => std::future::pending().await,
    }
}

async fn run<C: SpeechCapability>(
    mut capability: C,
    mut updates: mpsc::Receiver<InputUpdate>,
    snapshot: watch::Sender<InputSnapshot>,
) -> String {
    let mut buffer = TextBuffer::default();
    let mut voice: Option<mpsc::Receiver<VoiceEvent>> = None;

    loop {
        let next = tokio::select! {
            update = updates.recv() => Next::Update(update),
            event = next_voice_event(&mut voice) => Next::Voice(event),
        };

        match next {
            Next::Update(None) => break,
            Next::Update(Some(InputUpdate::Keyboard(text))) => buffer.replace(text),
            Next::Update(Some(InputUpdate::StartVoice)) => {
                if !buffer.listening {
                    buffer.voice_sessions += 1;
                    match capability.start().await {
                        Ok(rx) => {
                            info!("listening for ingredients");
                            voice = Some(rx);
                            buffer.listening = true;
                        }
                        Err(e) => warn!("Speech recognition error: {e}"),
                    }
                }
            }
            Next::Update(Some(InputUpdate::StopVoice)) => {
                if buffer.listening {
                    buffer.listening = false;
                    voice = None;
                    capability.stop().await;
                }
            }
            Next::Voice(VoiceEvent::Transcript(chunk)) => buffer.append_transcript(&chunk),
            Next::Voice(VoiceEvent::Error(message)) => {
                warn!("Speech recognition error: {message}");
                buffer.listening = false;
                voice = None;
                capability.stop().await;
            }
            Next::Voice(VoiceEvent::Ended) => {
                voice = None;
                // Still listening means the user never pressed stop: keep going.
                if buffer.listening {
                    match capability.start().await {
                        Ok(rx) => voice = Some(rx),
                        Err(VoiceError::Exhausted) => {
                            info!("dictation finished");
                            buffer.listening = false;
                        }
                        Err(e) => {
                            warn!("Speech recognition error: {e}");
                            buffer.listening = false;
                        }
                    }
                }
            }
        }

        snapshot.send_replace(buffer.snapshot());
    }

    if voice.is_some() {
        capability.stop().await;
    }
    buffer.text
}

/// Replays a transcript, one line per incremental result. Restarts continue
/// where the previous session stopped; once every line is delivered the
/// capability reports [`VoiceError::Exhausted`].
pub struct LineTranscriptSource {
    pending: Arc<Mutex<VecDeque<String>>>,
    task: Option<JoinHandle<()>>,
}

impl LineTranscriptSource {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = lines
            .into_iter()
            .map(Into::into)
            .map(|line: String| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self {
            pending: Arc::new(Mutex::new(pending)),
            task: None,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, VoiceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| VoiceError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_lines(content.lines()))
    }
}

#[async_trait]
impl SpeechCapability for LineTranscriptSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<VoiceEvent>, VoiceError> {
        if self.pending.lock().is_empty() {
            return Err(VoiceError::Exhausted);
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pending = Arc::clone(&self.pending);
        self.task = Some(tokio::spawn(async move {
            loop {
                let next = pending.lock().pop_front();
                match next {
                    Some(line) => {
                        if tx.send(VoiceEvent::Transcript(line)).await.is_err() {
                            return;
                        }
                    }
                    None => break,
                }
            }
            let _ = tx.send(VoiceEvent::Ended).await;
        }));
        Ok(rx)
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
