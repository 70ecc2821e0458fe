// tests/session_stream.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use tidings::llm::{GenerateClient, GenerationConfig, StreamEvent};
use tidings::{AnswerChunk, LlmError, OllamaClient, SessionManager};

enum Step {
    Delta(&'static str),
    /// Send `n` numbered chunks, enough to overflow the delivery channel.
    Flood(usize),
    Done,
    Fail(&'static str),
    WaitGate,
}

/// Plays one pre-written script per `start` call and records which prompts ran
/// to completion.
struct ScriptedClient {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    gate: Arc<Notify>,
    completed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClient {
    fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            gate: Arc::new(Notify::new()),
            completed: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl GenerateClient for ScriptedClient {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Api("not scripted".to_string()))
    }

    async fn stream(&self, prompt: &str, tx: mpsc::Sender<StreamEvent>) {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("one script per start");
        for step in script {
            match step {
                Step::Delta(text) => {
                    if tx.send(StreamEvent::Delta(text.to_string())).await.is_err() {
                        return;
                    }
                }
                Step::Flood(n) => {
                    for i in 0..n {
                        if tx
                            .send(StreamEvent::Delta(format!("flood-{i}")))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
                Step::Done => {
                    let _ = tx.send(StreamEvent::Done).await;
                }
                Step::Fail(msg) => {
                    let _ = tx
                        .send(StreamEvent::Failed(LlmError::Api(msg.to_string())))
                        .await;
                }
                Step::WaitGate => self.gate.notified().await,
            }
        }
        self.completed.lock().unwrap().push(prompt.to_string());
    }
}

async fn wait_for_completion(completed: &Arc<Mutex<Vec<String>>>, prompt: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if completed.lock().unwrap().iter().any(|p| p == prompt) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("superseded stream was not drained in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn chunks_arrive_in_order_then_the_session_closes() {
    let client = ScriptedClient::new(vec![vec![
        Step::Delta("Hel"),
        Step::Delta("lo"),
        Step::Done,
    ]]);
    let manager = SessionManager::new(Arc::new(client));

    let handle = manager.start("q");
    assert_eq!(
        manager.next(&handle).await.unwrap(),
        AnswerChunk { text: "Hel".to_string(), last: false }
    );
    assert_eq!(
        manager.next(&handle).await.unwrap(),
        AnswerChunk { text: "lo".to_string(), last: false }
    );
    assert!(manager.next(&handle).await.unwrap().last);

    // Terminal chunk consumed: further pulls fail fast instead of hanging.
    assert!(matches!(
        manager.next(&handle).await,
        Err(LlmError::SessionClosed)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failed_chunk_ends_the_session() {
    let client = ScriptedClient::new(vec![vec![Step::Delta("partial"), Step::Fail("boom")]]);
    let manager = SessionManager::new(Arc::new(client));

    let handle = manager.start("q");
    assert_eq!(manager.next(&handle).await.unwrap().text, "partial");
    assert!(matches!(
        manager.next(&handle).await,
        Err(LlmError::Api(msg)) if msg == "boom"
    ));
    assert!(matches!(
        manager.next(&handle).await,
        Err(LlmError::SessionClosed)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn superseding_never_leaks_old_chunks_and_drains_the_old_stream() {
    let client = ScriptedClient::new(vec![
        // Old session: one chunk, then (after the gate) far more chunks than
        // the delivery channel holds - only a background drain lets it finish.
        vec![Step::Delta("old-0"), Step::WaitGate, Step::Flood(100), Step::Done],
        vec![Step::Delta("new-0"), Step::Done],
    ]);
    let gate = Arc::clone(&client.gate);
    let completed = Arc::clone(&client.completed);
    let manager = SessionManager::new(Arc::new(client));

    let old = manager.start("old prompt");
    assert_eq!(manager.next(&old).await.unwrap().text, "old-0");

    let new = manager.start("new prompt");
    let first = manager.next(&new).await.unwrap();
    assert_eq!(first.text, "new-0");

    // The retired handle fails fast.
    assert!(matches!(manager.next(&old).await, Err(LlmError::Superseded)));

    // Let the old producer flood; the drain must consume it to completion.
    gate.notify_one();
    wait_for_completion(&completed, "old prompt").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_pull_pending_across_a_supersede_returns_superseded_not_content() {
    let client = ScriptedClient::new(vec![
        vec![Step::WaitGate, Step::Delta("late"), Step::Done],
        vec![Step::Delta("new-0"), Step::Done],
    ]);
    let gate = Arc::clone(&client.gate);
    let completed = Arc::clone(&client.completed);
    let manager = Arc::new(SessionManager::new(Arc::new(client)));

    let old = manager.start("old prompt");
    let pending = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.next(&old).await })
    };
    // Give the pull a moment to park on the empty channel.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let new = manager.start("new prompt");
    gate.notify_one();

    // The late chunk is discarded, never delivered to anyone.
    assert!(matches!(
        pending.await.unwrap(),
        Err(LlmError::Superseded)
    ));
    assert_eq!(manager.next(&new).await.unwrap().text, "new-0");
    wait_for_completion(&completed, "old prompt").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_disabled_backend_fails_the_first_pull_without_network() {
    let config = GenerationConfig {
        enabled: false,
        url: "http://127.0.0.1:1".to_string(),
        ..GenerationConfig::default()
    };
    let client = OllamaClient::new(config).unwrap();
    let manager = SessionManager::new(Arc::new(client));

    let handle = manager.start("anything");
    assert!(matches!(
        manager.next(&handle).await,
        Err(LlmError::Disabled)
    ));
    assert!(matches!(
        manager.next(&handle).await,
        Err(LlmError::SessionClosed)
    ));
}
