//! Turn streaming integration tests against scripted in-memory transports

use serde_json::json;
use states_sandbox::core::config::ClientConfig;
use states_sandbox::core::error::{Result, SandboxError};
use states_sandbox::core::types::{StateId, TurnTarget};
use states_sandbox::snapshot::document::{Snapshot, SnapshotDate};
use states_sandbox::snapshot::series::SnapshotSeries;
use states_sandbox::turn::client::{ChunkSource, StreamEnd, TurnPhase, TurnStreamClient, TurnTransport};
use states_sandbox::turn::event::TurnEvent;
use states_sandbox::turn::handler::{SeriesUpdater, TurnHandler};
use states_sandbox::turn::request::TurnRequest;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const STATUS: &str = "{\"type\":\"status\",\"message\":\"Simulating economy\"}\n";
const COMPLETE: &str = "{\"type\":\"complete\"}\n";

fn snapshot_frame() -> String {
    let frame = json!({
        "type": "state_snapshot_complete",
        "state_snapshot": {
            "id": 2,
            "state_id": 1,
            "date": "2025-02-01",
            "json_state": {"economy": {"economic_metrics": {"gross_domestic_product_gdp": {"value": 110, "unit": "USD"}}}},
            "markdown_delta_report": "Exports rose."
        }
    });
    format!("{}\n", frame)
}

fn seeded_series() -> SnapshotSeries {
    let document = json!({"economy": {"economic_metrics": {"gross_domestic_product_gdp": {"value": 100, "unit": "USD"}}}});
    SnapshotSeries::from_newest_first(vec![Snapshot::new(SnapshotDate::new(2025, 1, 1).unwrap(), document)])
}

/// Fixed chunks, delivered in order; optionally fails opening
struct Scripted {
    opens: AtomicUsize,
    chunks: Vec<Vec<u8>>,
    open_error: Option<fn() -> SandboxError>,
    break_after: bool,
}

impl Scripted {
    fn new(chunks: &[&str]) -> Self {
        Self {
            opens: AtomicUsize::new(0),
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            open_error: None,
            break_after: false,
        }
    }
}

struct ScriptedChunks {
    chunks: VecDeque<Vec<u8>>,
    break_after: bool,
}

impl ChunkSource for ScriptedChunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.break_after => Err(SandboxError::Transport("connection reset".into())),
            None => Ok(None),
        }
    }
}

impl TurnTransport for Scripted {
    type Stream = ScriptedChunks;

    async fn open(&self, _request: &TurnRequest) -> Result<ScriptedChunks> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.open_error {
            return Err(error());
        }
        Ok(ScriptedChunks {
            chunks: self.chunks.iter().cloned().collect(),
            break_after: self.break_after,
        })
    }
}

/// Chunks pushed by the test while the turn is running
struct Channel {
    opens: AtomicUsize,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl Channel {
    fn new() -> (Self, mpsc::UnboundedSender<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            opens: AtomicUsize::new(0),
            rx: Mutex::new(Some(rx)),
        };
        (channel, tx)
    }
}

struct ChannelChunks(mpsc::UnboundedReceiver<Vec<u8>>);

impl ChunkSource for ChannelChunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.0.recv().await)
    }
}

impl TurnTransport for Channel {
    type Stream = ChannelChunks;

    async fn open(&self, _request: &TurnRequest) -> Result<ChannelChunks> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SandboxError::Transport("already opened".into()))?;
        Ok(ChannelChunks(rx))
    }
}

#[tokio::test]
async fn test_second_turn_rejected_without_request() {
    let client = TurnStreamClient::new();
    let transport = Scripted::new(&[COMPLETE]);
    let target = TurnTarget::Nation(StateId(1));

    let first = client.start(TurnRequest::play(StateId(1), "Cut taxes")).unwrap();
    let second = client.start(TurnRequest::play(StateId(1), "Raise taxes"));
    assert!(matches!(second, Err(SandboxError::TurnInProgress(t)) if t == target));
    assert_eq!(transport.opens.load(Ordering::SeqCst), 0);

    let outcome = first.run(&transport, &mut |_: &TurnEvent| {}).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    assert_eq!(client.phase(target), TurnPhase::Idle);
}

#[tokio::test]
async fn test_rejected_while_streaming() {
    let client = TurnStreamClient::new();
    let (transport, tx) = Channel::new();
    let target = TurnTarget::Nation(StateId(4));
    let pending = client.start(TurnRequest::play(StateId(4), "Build rail")).unwrap();

    let mut handler = |_: &TurnEvent| {};
    let outcome = {
        let run = pending.run(&transport, &mut handler);
        tokio::pin!(run);

        tx.send(STATUS.as_bytes().to_vec()).unwrap();
        assert!(timeout(Duration::from_millis(50), &mut run).await.is_err());
        assert_eq!(client.phase(target), TurnPhase::Streaming);
        assert!(client.start(TurnRequest::play(StateId(4), "again")).is_err());

        tx.send(COMPLETE.as_bytes().to_vec()).unwrap();
        run.await.unwrap()
    };
    assert!(outcome.is_success());
    assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_snapshot_prepended_once_and_resolved_after_complete() {
    let client = TurnStreamClient::new();
    let (transport, tx) = Channel::new();
    let config = ClientConfig::default();
    let mut series = seeded_series();
    let pending = client.start(TurnRequest::play(StateId(1), "Invest in ports")).unwrap();

    let mut updater = SeriesUpdater::new(&mut series, &config);
    let outcome = {
        let run = pending.run(&transport, &mut updater);
        tokio::pin!(run);

        tx.send(STATUS.as_bytes().to_vec()).unwrap();
        tx.send(STATUS.as_bytes().to_vec()).unwrap();
        tx.send(snapshot_frame().into_bytes()).unwrap();
        assert!(
            timeout(Duration::from_millis(50), &mut run).await.is_err(),
            "resolved before complete"
        );

        tx.send(COMPLETE.as_bytes().to_vec()).unwrap();
        run.await.unwrap()
    };

    assert!(outcome.is_success());
    assert_eq!(outcome.end, StreamEnd::Complete);
    assert_eq!(outcome.events, 4);
    assert_eq!(outcome.last_status.as_deref(), Some("Simulating economy"));
    assert!(updater.prepended());
    assert_eq!(updater.report.as_deref(), Some("Exports rose."));
    drop(updater);

    assert_eq!(series.len(), 2);
    assert_eq!(series.latest().unwrap().date, SnapshotDate::new(2025, 2, 1).unwrap());
    assert_eq!(series.percent_change("gdp").unwrap(), "+10.00%");
}

#[tokio::test]
async fn test_end_without_complete_is_soft_failure() {
    let client = TurnStreamClient::new();
    let transport = Scripted::new(&[STATUS, &snapshot_frame()]);
    let mut series = seeded_series();
    let config = ClientConfig::default();
    let mut updater = SeriesUpdater::new(&mut series, &config);

    let outcome = client
        .play(&transport, TurnRequest::play(StateId(1), "Print money"), &mut updater)
        .await
        .unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.phase, TurnPhase::Failed);
    assert_eq!(outcome.end, StreamEnd::EndOfStream);
    assert!(client.start(TurnRequest::play(StateId(1), "retry")).is_ok());
}

#[tokio::test]
async fn test_transport_error_is_swallowed() {
    let client = TurnStreamClient::new();
    let mut transport = Scripted::new(&[STATUS]);
    transport.break_after = true;

    let outcome = client
        .play(&transport, TurnRequest::play(StateId(2), "x"), &mut |_: &TurnEvent| {})
        .await
        .unwrap();
    assert!(matches!(outcome.end, StreamEnd::Transport(_)));
    assert_eq!(outcome.events, 1);
    assert_eq!(client.phase(TurnTarget::Nation(StateId(2))), TurnPhase::Idle);
}

#[tokio::test]
async fn test_open_failure_is_soft_but_auth_propagates() {
    let client = TurnStreamClient::new();

    let mut down = Scripted::new(&[]);
    down.open_error = Some(|| SandboxError::Transport("connection refused".into()));
    let outcome = client
        .play(&down, TurnRequest::play(StateId(3), "x"), &mut |_: &TurnEvent| {})
        .await
        .unwrap();
    assert!(matches!(outcome.end, StreamEnd::Transport(_)));

    let mut rejected = Scripted::new(&[]);
    rejected.open_error = Some(|| SandboxError::Auth("token expired".into()));
    let result = client
        .play(&rejected, TurnRequest::play(StateId(3), "x"), &mut |_: &TurnEvent| {})
        .await;
    assert!(matches!(result, Err(ref e) if e.is_auth()));
    assert_eq!(client.phase(TurnTarget::Nation(StateId(3))), TurnPhase::Idle);
}

#[tokio::test]
async fn test_cancel_releases_lock() {
    let client = TurnStreamClient::new();
    let (transport, tx) = Channel::new();
    let pending = client.start(TurnRequest::play(StateId(5), "Slow reform")).unwrap();
    let cancel = pending.cancel_handle();

    let mut seen = 0;
    let mut handler = |_: &TurnEvent| seen += 1;
    let outcome = {
        let run = pending.run(&transport, &mut handler);
        tokio::pin!(run);
        tx.send(STATUS.as_bytes().to_vec()).unwrap();
        assert!(timeout(Duration::from_millis(50), &mut run).await.is_err());
        cancel.cancel();
        run.await.unwrap()
    };

    assert_eq!(outcome.end, StreamEnd::Cancelled);
    assert_eq!(seen, 1);
    assert_eq!(client.phase(TurnTarget::Nation(StateId(5))), TurnPhase::Idle);
    assert!(client.start(TurnRequest::play(StateId(5), "again")).is_ok());
}

#[tokio::test]
async fn test_creation_flow_exposes_new_state() {
    let client = TurnStreamClient::new();
    let transport = Scripted::new(&[
        "{\"type\":\"status\",\"message\":\"Drafting constitution\"}\n{\"type\":\"state_cre",
        "ated\",\"id\":31}\n{\"type\":\"heartbeat\"}\n",
        "{\"type\":\"complete\"}",
    ]);
    let request = TurnRequest::create("Veloria", &[4, 2, 5, 1, 3, 3, 4, 2, 5, 1]).unwrap();

    let mut kinds = Vec::new();
    let mut handler = |e: &TurnEvent| kinds.push(e.kind());
    let outcome = client.play(&transport, request, &mut handler).await.unwrap();

    assert_eq!(outcome.target, TurnTarget::Creation);
    assert_eq!(outcome.created_state(), Some(StateId(31)));
    assert_eq!(kinds, vec!["status", "state_created", "heartbeat", "complete"]);
}

#[tokio::test]
async fn test_credits_error_does_not_end_stream() {
    let client = TurnStreamClient::new();
    let transport = Scripted::new(&[
        "{\"type\":\"error\",\"message\":\"Not enough credits\"}\n",
        STATUS,
        COMPLETE,
    ]);
    let mut series = seeded_series();
    let config = ClientConfig::default();
    let mut updater = SeriesUpdater::new(&mut series, &config);

    let outcome = client
        .play(&transport, TurnRequest::play(StateId(8), "x"), &mut updater)
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert!(outcome.credits_exhausted());
    assert_eq!(updater.redirect.as_ref().map(|r| r.target.as_str()), Some("/account?buy=true"));
    assert_eq!(updater.redirect.as_ref().map(|r| r.delay), Some(Duration::from_secs(2)));
    assert!(!updater.prepended());
}

#[test]
fn test_handler_trait_object() {
    let mut count = 0;
    {
        let mut closure = |_: &TurnEvent| count += 1;
        let handler: &mut dyn TurnHandler = &mut closure;
        handler.on_event(&TurnEvent::Complete {});
    }
    assert_eq!(count, 1);
}
