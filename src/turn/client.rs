//! Streaming client for turn and creation requests
//!
//! Lifecycle of one request: `Idle -> Requesting -> Streaming -> Completed | Failed`.
//!
//! - At most one request per [`TurnTarget`] is in flight; `start` refuses a
//!   second one before any I/O happens.
//! - Frames reach the handler one at a time, in arrival order.
//! - Only a `complete` frame makes the outcome a success. Running out of
//!   stream or losing the connection is a soft failure (`Ok` with a
//!   `Failed` outcome) because the simulation may still have finished on
//!   the server. Auth rejections are the one hard error.
//! - Dropping or cancelling a turn releases its lock. Nothing is retried.

use crate::core::error::{Result, SandboxError};
use crate::core::types::{StateId, TurnTarget};
use crate::turn::decoder::EventDecoder;
use crate::turn::event::{ErrorEvent, TurnEvent};
use crate::turn::handler::TurnHandler;
use crate::turn::request::TurnRequest;
use ahash::AHashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

impl TurnPhase {
    /// A request is open for this target
    pub fn is_busy(self) -> bool {
        matches!(self, TurnPhase::Requesting | TurnPhase::Streaming)
    }
}

/// Why the stream stopped
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    /// A `complete` frame arrived
    Complete,
    /// The body ended without `complete`
    EndOfStream,
    /// Connection or I/O failure, swallowed
    Transport(String),
    Cancelled,
}

/// How a turn ended; produced once per request
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub target: TurnTarget,
    /// `Completed` or `Failed`
    pub phase: TurnPhase,
    pub end: StreamEnd,
    pub last_status: Option<String>,
    /// Error events seen during the stream (they do not end it)
    pub errors: Vec<ErrorEvent>,
    /// Frames dispatched to the handler
    pub events: usize,
    pub elapsed: Duration,
    created: Option<StateId>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.phase == TurnPhase::Completed
    }

    /// Id announced by `state_created`, only once the request completed
    pub fn created_state(&self) -> Option<StateId> {
        if self.is_success() {
            self.created
        } else {
            None
        }
    }

    pub fn credits_exhausted(&self) -> bool {
        self.errors.iter().any(ErrorEvent::is_credits_exhausted)
    }
}

/// Incremental response body
#[allow(async_fn_in_trait)]
pub trait ChunkSource {
    /// Next chunk of bytes, `None` at end of body
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Opens the streamed request
#[allow(async_fn_in_trait)]
pub trait TurnTransport {
    type Stream: ChunkSource;

    /// Send the request; must fail with `SandboxError::Auth` on a rejected credential
    async fn open(&self, request: &TurnRequest) -> Result<Self::Stream>;
}

/// Per-target phases of requests currently in flight
#[derive(Debug, Clone, Default)]
struct InFlight {
    phases: Arc<Mutex<AHashMap<TurnTarget, TurnPhase>>>,
}

impl InFlight {
    fn acquire(&self, target: TurnTarget) -> Result<InFlightGuard> {
        let mut phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        if phases.contains_key(&target) {
            return Err(SandboxError::TurnInProgress(target));
        }
        phases.insert(target, TurnPhase::Requesting);
        Ok(InFlightGuard {
            target,
            phases: Arc::clone(&self.phases),
        })
    }

    fn phase(&self, target: TurnTarget) -> TurnPhase {
        let phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        phases.get(&target).copied().unwrap_or(TurnPhase::Idle)
    }
}

/// Holds a target's slot; releasing it returns the target to `Idle`
#[derive(Debug)]
struct InFlightGuard {
    target: TurnTarget,
    phases: Arc<Mutex<AHashMap<TurnTarget, TurnPhase>>>,
}

impl InFlightGuard {
    fn set(&self, phase: TurnPhase) {
        let mut phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        phases.insert(self.target, phase);
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        phases.remove(&self.target);
    }
}

/// Aborts the connection of a running turn
#[derive(Debug, Clone)]
pub struct CancelHandle {
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Stores a permit, so a cancel issued before `run` polls still lands
        self.notify.notify_one();
    }
}

/// Client that starts turns; cheap to clone, clones share the in-flight table
#[derive(Debug, Clone, Default)]
pub struct TurnStreamClient {
    in_flight: InFlight,
}

impl TurnStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase for `target`; `Idle` when nothing is in flight
    pub fn phase(&self, target: TurnTarget) -> TurnPhase {
        self.in_flight.phase(target)
    }

    /// Whether the control that starts a turn for `target` should be disabled
    pub fn is_busy(&self, target: TurnTarget) -> bool {
        self.phase(target).is_busy()
    }

    /// Claim the target's slot
    ///
    /// Fails with `TurnInProgress` if a request for the same target is
    /// already open. No I/O happens here.
    pub fn start(&self, request: TurnRequest) -> Result<PendingTurn> {
        let guard = self.in_flight.acquire(request.target())?;
        Ok(PendingTurn {
            request,
            guard,
            cancel: Arc::new(Notify::new()),
        })
    }

    /// `start` followed by `run`
    pub async fn play<T, H>(&self, transport: &T, request: TurnRequest, handler: &mut H) -> Result<TurnOutcome>
    where
        T: TurnTransport,
        H: TurnHandler + ?Sized,
    {
        self.start(request)?.run(transport, handler).await
    }
}

/// A claimed, not yet finished request
#[derive(Debug)]
pub struct PendingTurn {
    request: TurnRequest,
    guard: InFlightGuard,
    cancel: Arc<Notify>,
}

impl PendingTurn {
    pub fn target(&self) -> TurnTarget {
        self.request.target()
    }

    pub fn request(&self) -> &TurnRequest {
        &self.request
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            notify: Arc::clone(&self.cancel),
        }
    }

    /// Send the request and feed every frame to `handler` until the stream ends
    pub async fn run<T, H>(self, transport: &T, handler: &mut H) -> Result<TurnOutcome>
    where
        T: TurnTransport,
        H: TurnHandler + ?Sized,
    {
        let target = self.request.target();
        let mut run = RunState::new(target);
        tracing::info!("Requesting turn for {}", target);

        let opened = tokio::select! {
            biased;
            _ = self.cancel.notified() => None,
            opened = transport.open(&self.request) => Some(opened),
        };

        let mut stream = match opened {
            Some(Ok(stream)) => stream,
            Some(Err(e)) if e.is_auth() => {
                tracing::warn!("Turn for {} rejected: {}", target, e);
                return Err(e);
            }
            Some(Err(e)) => {
                tracing::warn!("Turn for {} could not be opened: {}", target, e);
                return Ok(run.finish(StreamEnd::Transport(e.to_string())));
            }
            None => return Ok(run.finish(StreamEnd::Cancelled)),
        };

        self.guard.set(TurnPhase::Streaming);
        tracing::debug!("Streaming events for {}", target);

        let mut decoder = EventDecoder::new();
        let end = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.notified() => break StreamEnd::Cancelled,
                next = stream.next_chunk() => next,
            };

            match next {
                Ok(Some(chunk)) => {
                    if run.dispatch_all(decoder.push(&chunk), handler) {
                        break StreamEnd::Complete;
                    }
                }
                Ok(None) => {
                    if run.dispatch_all(decoder.finish(), handler) {
                        break StreamEnd::Complete;
                    }
                    break StreamEnd::EndOfStream;
                }
                Err(e) => {
                    tracing::warn!("Stream for {} broke off: {}", target, e);
                    break StreamEnd::Transport(e.to_string());
                }
            }
        };
        drop(stream);

        let outcome = run.finish(end);
        self.guard.set(outcome.phase);
        match outcome.end {
            StreamEnd::Complete => tracing::info!(
                "Turn for {} completed after {:.1}s ({} events)",
                target,
                outcome.elapsed.as_secs_f32(),
                outcome.events
            ),
            ref end => tracing::warn!("Turn for {} ended without completing: {:?}", target, end),
        }
        Ok(outcome)
    }
}

/// Bookkeeping while frames are dispatched
struct RunState {
    target: TurnTarget,
    started: Instant,
    last_status: Option<String>,
    errors: Vec<ErrorEvent>,
    created: Option<StateId>,
    events: usize,
}

impl RunState {
    fn new(target: TurnTarget) -> Self {
        Self {
            target,
            started: Instant::now(),
            last_status: None,
            errors: Vec::new(),
            created: None,
            events: 0,
        }
    }

    /// Returns true once `complete` has been dispatched; later frames are dropped
    fn dispatch_all<H: TurnHandler + ?Sized>(&mut self, events: Vec<TurnEvent>, handler: &mut H) -> bool {
        for event in events {
            if self.dispatch(event, handler) {
                return true;
            }
        }
        false
    }

    fn dispatch<H: TurnHandler + ?Sized>(&mut self, event: TurnEvent, handler: &mut H) -> bool {
        self.events += 1;
        tracing::debug!("{} event for {}", event.kind(), self.target);

        match &event {
            TurnEvent::Status { message } => self.last_status = Some(message.clone()),
            TurnEvent::StateCreated { id } => self.created = Some(*id),
            TurnEvent::Error(error) => {
                tracing::warn!("Error event for {}: {}", self.target, error.message);
                self.errors.push(error.clone());
            }
            TurnEvent::StateSnapshotComplete { .. }
            | TurnEvent::Complete {}
            | TurnEvent::Heartbeat {}
            | TurnEvent::Unknown => {}
        }

        handler.on_event(&event);
        matches!(event, TurnEvent::Complete {})
    }

    fn finish(self, end: StreamEnd) -> TurnOutcome {
        let phase = if end == StreamEnd::Complete {
            TurnPhase::Completed
        } else {
            TurnPhase::Failed
        };
        TurnOutcome {
            target: self.target,
            phase,
            end,
            last_status: self.last_status,
            errors: self.errors,
            events: self.events,
            elapsed: self.started.elapsed(),
            created: self.created,
        }
    }
}
