// src/llm/session.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{GenerateClient, LlmError, StreamEvent};

const CHANNEL_CAPACITY: usize = 32;

/// One unit of answer text handed to the caller. `last` marks end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerChunk {
    pub text: String,
    pub last: bool,
}

/// Caller-side reference to a generation session. Goes stale the moment a
/// newer prompt is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    id: u64,
}

struct ActiveSession {
    id: u64,
    // Taken out while a `next` call is pulling on it.
    rx: Option<mpsc::Receiver<StreamEvent>>,
    finished: bool,
}

/// Owns at most one live generation stream. Starting a new prompt retires the
/// previous session: its producer keeps running against a background drain so
/// the connection is read to the end, and none of its chunks reach the caller.
pub struct SessionManager {
    client: Arc<dyn GenerateClient>,
    next_id: AtomicU64,
    // Single synchronization point between callers and retirement.
    // Never held across an await.
    active: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(client: Arc<dyn GenerateClient>) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Open a session for `prompt`, superseding any in-flight one.
    pub fn start(&self, prompt: impl Into<String>) -> SessionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let previous = {
            let mut active = self.active.lock().expect("session slot poisoned");
            active.replace(ActiveSession {
                id,
                rx: Some(rx),
                finished: false,
            })
        };
        if let Some(prev) = previous {
            if !prev.finished {
                if let Some(prev_rx) = prev.rx {
                    spawn_drain(prev.id, prev_rx);
                }
                // When the receiver is out with a puller, that puller routes it
                // to a drain task as soon as it observes the stale id.
            }
        }

        let client = Arc::clone(&self.client);
        let prompt = prompt.into();
        tokio::spawn(async move {
            client.stream(&prompt, tx).await;
        });

        SessionHandle { id }
    }

    /// Pull the next chunk for `handle`, suspending only this caller.
    ///
    /// Fails fast with `Superseded` for stale handles and `SessionClosed` once
    /// a terminal chunk has been consumed — it never hangs on a dead session.
    pub async fn next(&self, handle: &SessionHandle) -> Result<AnswerChunk, LlmError> {
        let mut rx = {
            let mut active = self.active.lock().expect("session slot poisoned");
            let session = match active.as_mut() {
                Some(s) if s.id == handle.id => s,
                _ => return Err(LlmError::Superseded),
            };
            if session.finished {
                return Err(LlmError::SessionClosed);
            }
            match session.rx.take() {
                Some(rx) => rx,
                None => {
                    return Err(LlmError::Stream(
                        "concurrent pull on one session".to_string(),
                    ))
                }
            }
        };

        let event = rx.recv().await;

        let mut active = self.active.lock().expect("session slot poisoned");
        match active.as_mut() {
            Some(session) if session.id == handle.id => match event {
                Some(StreamEvent::Delta(text)) => {
                    session.rx = Some(rx);
                    Ok(AnswerChunk { text, last: false })
                }
                Some(StreamEvent::Done) => {
                    session.finished = true;
                    Ok(AnswerChunk {
                        text: String::new(),
                        last: true,
                    })
                }
                Some(StreamEvent::Failed(e)) => {
                    session.finished = true;
                    Err(e)
                }
                None => {
                    session.finished = true;
                    Err(LlmError::Stream(
                        "producer stopped before completion".to_string(),
                    ))
                }
            },
            _ => {
                // Superseded while we were waiting: the received chunk belongs
                // to the retired session, so it is dropped, and the receiver
                // goes to the drain.
                if event.is_some() {
                    spawn_drain(handle.id, rx);
                }
                Err(LlmError::Superseded)
            }
        }
    }
}

fn spawn_drain(id: u64, mut rx: mpsc::Receiver<StreamEvent>) {
    tokio::spawn(async move {
        let mut dropped = 0usize;
        while rx.recv().await.is_some() {
            dropped += 1;
        }
        tracing::debug!(session = id, dropped, "superseded stream drained");
    });
}
