//! In-process ingest provider.
//!
//! Stands in for the network library: round-trips are counted, sent units
//! are recorded, and the status queue is fed by the owner through
//! [`LoopbackProvider::push_status`]. Each operation can be made to fail
//! once with a chosen status code.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::ProviderCode;
use crate::provider::{IngestHandle, IngestParams, IngestProvider, MediaKind};
use crate::status::{ConnectionEvent, EventReason, EventType, StatusMessage};
use crate::util::lock_or_recover;

/// Snapshot of provider round-trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub creates: usize,
    pub connects: usize,
    pub disconnects: usize,
    pub destroys: usize,
    pub sends: usize,
    pub polls: usize,
}

/// A media unit as the provider received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentUnit {
    pub kind: MediaKind,
    pub timestamp_us: u64,
    pub payload: Bytes,
    pub end_of_frame: bool,
}

#[derive(Debug, Default)]
struct Failures {
    create: Option<ProviderCode>,
    connect: Option<ProviderCode>,
    disconnect: Option<ProviderCode>,
    destroy: Option<ProviderCode>,
    send: Option<ProviderCode>,
}

#[derive(Default)]
struct Calls {
    creates: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    destroys: AtomicUsize,
    sends: AtomicUsize,
    polls: AtomicUsize,
}

struct Shared {
    calls: Calls,
    failures: Mutex<Failures>,
    sent: Mutex<Vec<SentUnit>>,
    last_params: Mutex<Option<IngestParams>>,
    status_tx: Sender<Result<StatusMessage, ProviderCode>>,
    status_rx: Receiver<Result<StatusMessage, ProviderCode>>,
}

#[derive(Clone)]
pub struct LoopbackProvider {
    shared: Arc<Shared>,
}

impl Default for LoopbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackProvider {
    pub fn new() -> Self {
        let (status_tx, status_rx) = unbounded();
        Self {
            shared: Arc::new(Shared {
                calls: Calls::default(),
                failures: Mutex::new(Failures::default()),
                sent: Mutex::new(Vec::new()),
                last_params: Mutex::new(None),
                status_tx,
                status_rx,
            }),
        }
    }

    /// Queues a message for the next status poll.
    pub fn push_status(&self, message: StatusMessage) {
        let _ = self.shared.status_tx.send(Ok(message));
    }

    /// Makes one status poll fail with `code`.
    pub fn push_poll_error(&self, code: ProviderCode) {
        let _ = self.shared.status_tx.send(Err(code));
    }

    pub fn pending_status(&self) -> usize {
        self.shared.status_rx.len()
    }

    pub fn fail_next_create(&self, code: ProviderCode) {
        lock_or_recover(&self.shared.failures).create = Some(code);
    }

    pub fn fail_next_connect(&self, code: ProviderCode) {
        lock_or_recover(&self.shared.failures).connect = Some(code);
    }

    pub fn fail_next_disconnect(&self, code: ProviderCode) {
        lock_or_recover(&self.shared.failures).disconnect = Some(code);
    }

    pub fn fail_next_destroy(&self, code: ProviderCode) {
        lock_or_recover(&self.shared.failures).destroy = Some(code);
    }

    pub fn fail_next_send(&self, code: ProviderCode) {
        lock_or_recover(&self.shared.failures).send = Some(code);
    }

    pub fn counters(&self) -> Counters {
        let calls = &self.shared.calls;
        Counters {
            creates: calls.creates.load(Ordering::SeqCst),
            connects: calls.connects.load(Ordering::SeqCst),
            disconnects: calls.disconnects.load(Ordering::SeqCst),
            destroys: calls.destroys.load(Ordering::SeqCst),
            sends: calls.sends.load(Ordering::SeqCst),
            polls: calls.polls.load(Ordering::SeqCst),
        }
    }

    pub fn sent_units(&self) -> Vec<SentUnit> {
        lock_or_recover(&self.shared.sent).clone()
    }

    pub fn last_params(&self) -> Option<IngestParams> {
        lock_or_recover(&self.shared.last_params).clone()
    }
}

fn take_failure(
    shared: &Shared,
    pick: impl FnOnce(&mut Failures) -> &mut Option<ProviderCode>,
) -> Result<(), ProviderCode> {
    match pick(&mut lock_or_recover(&shared.failures)).take() {
        Some(code) => Err(code),
        None => Ok(()),
    }
}

impl IngestProvider for LoopbackProvider {
    fn create(&self, params: &IngestParams) -> Result<Box<dyn IngestHandle>, ProviderCode> {
        self.shared.calls.creates.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.shared, |f| &mut f.create)?;
        *lock_or_recover(&self.shared.last_params) = Some(params.clone());
        Ok(Box::new(LoopbackHandle {
            shared: self.shared.clone(),
        }))
    }

    fn describe(&self, code: ProviderCode) -> Cow<'static, str> {
        match code.0 {
            0 => Cow::Borrowed("success"),
            4 => Cow::Borrowed("connect error"),
            14 => Cow::Borrowed("bad or invalid stream key"),
            17 => Cow::Borrowed("not connected"),
            20 => Cow::Borrowed("status timeout"),
            27 => Cow::Borrowed("no media timeout"),
            other => Cow::Owned(format!("loopback status {}", other)),
        }
    }
}

struct LoopbackHandle {
    shared: Arc<Shared>,
}

impl LoopbackHandle {
    fn queue_event(&self, event_type: EventType, reason: EventReason) {
        let _ = self.shared.status_tx.send(Ok(StatusMessage::Event(ConnectionEvent {
            event_type,
            reason,
            error_code: ProviderCode(0),
        })));
    }
}

impl IngestHandle for LoopbackHandle {
    fn connect(&self) -> Result<(), ProviderCode> {
        self.shared.calls.connects.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.shared, |f| &mut f.connect)?;
        self.queue_event(EventType::Connected, EventReason::None);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ProviderCode> {
        self.shared.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.shared, |f| &mut f.disconnect)?;
        self.queue_event(EventType::Disconnected, EventReason::ApiRequest);
        Ok(())
    }

    fn destroy(&self) -> Result<(), ProviderCode> {
        self.shared.calls.destroys.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.shared, |f| &mut f.destroy)
    }

    fn send_media(
        &self,
        kind: MediaKind,
        timestamp_us: u64,
        payload: &[u8],
        end_of_frame: bool,
    ) -> Result<usize, ProviderCode> {
        self.shared.calls.sends.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.shared, |f| &mut f.send)?;
        lock_or_recover(&self.shared.sent).push(SentUnit {
            kind,
            timestamp_us,
            payload: Bytes::copy_from_slice(payload),
            end_of_frame,
        });
        Ok(payload.len())
    }

    fn poll_status(&self, timeout: Duration) -> Result<Option<StatusMessage>, ProviderCode> {
        self.shared.calls.polls.fetch_add(1, Ordering::SeqCst);
        let next = if timeout.is_zero() {
            match self.shared.status_rx.try_recv() {
                Ok(next) => next,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(None),
            }
        } else {
            match self.shared.status_rx.recv_timeout(timeout) {
                Ok(next) => next,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Ok(None)
                }
            }
        };
        next.map(Some)
    }
}
