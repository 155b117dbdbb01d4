//! # Status Monitor
//!
//! Background loop draining the ingest status queue while a session is
//! active. Each pass blocks for at most one poll interval, then drains
//! whatever else is already queued without waiting. Counters seen during a
//! pass are folded into one [`StatsSummary`] and reported once.
//!
//! Poll failures are logged and never end the loop. The only condition the
//! monitor escalates is the ingest disconnecting on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::error::SessionError;
use crate::link::SessionLink;
use crate::observer::SessionObserver;
use crate::stats::StatsSummary;
use crate::status::{ConnectionEvent, LogLevel, LogSeverity, StatusMessage};

/// Upper bound on how long a poll blocks, and so on stop latency.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

const INGEST_TARGET: &str = "ftl::ingest";

/// Outcome of one poll pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub messages: usize,
    pub summary: Option<StatsSummary>,
    pub connection_lost: bool,
}

/// Decodes status messages for one session.
pub struct StatusDrain {
    link: Arc<SessionLink>,
    observer: Arc<dyn SessionObserver>,
}

impl StatusDrain {
    pub fn new(link: Arc<SessionLink>, observer: Arc<dyn SessionObserver>) -> Self {
        Self { link, observer }
    }

    /// Runs one pass: a bounded wait for the first message, then a
    /// zero-timeout drain of everything already queued.
    pub fn pass(&self, timeout: Duration) -> PassReport {
        let mut report = PassReport::default();
        let mut summary: Option<StatsSummary> = None;

        trace!("getting status");
        let mut polled = self.link.poll_status(timeout);
        loop {
            match polled {
                Ok(Some(message)) => {
                    report.messages += 1;
                    if self.handle_message(message, &mut summary) {
                        report.connection_lost = true;
                    }
                }
                Ok(None) => {
                    trace!("status queue empty");
                    break;
                }
                Err(err) => {
                    warn!("{}", err);
                    break;
                }
            }
            trace!("getting more status");
            polled = self.link.poll_status(Duration::ZERO);
        }

        if let Some(summary) = &summary {
            self.observer.stats(summary);
        }
        report.summary = summary;
        report
    }

    /// Returns true when the message escalated to a fatal condition.
    fn handle_message(&self, message: StatusMessage, summary: &mut Option<StatsSummary>) -> bool {
        trace!(kind = %message.kind(), "status message");
        match message {
            StatusMessage::Log { severity, message } => {
                forward_log(severity, message.trim_end());
            }
            StatusMessage::Event(event) => return self.handle_event(&event),
            StatusMessage::PacketStats(stats) => {
                debug!(
                    period_ms = stats.period_ms,
                    sent = stats.sent,
                    nack_requests = stats.nack_requests,
                    lost = stats.lost,
                    recovered = stats.recovered,
                    late = stats.late,
                    "packet stats"
                );
                summary.get_or_insert_with(StatsSummary::default).fold_packets(&stats);
            }
            StatusMessage::InstantPacketStats(stats) => {
                debug!(
                    period_ms = stats.period_ms,
                    rtt_avg = stats.avg_rtt,
                    rtt_min = stats.min_rtt,
                    rtt_max = stats.max_rtt,
                    delay_avg = stats.avg_xmit_delay,
                    delay_min = stats.min_xmit_delay,
                    delay_max = stats.max_xmit_delay,
                    "instant packet stats"
                );
                summary.get_or_insert_with(StatsSummary::default).fold_instant(&stats);
            }
            StatusMessage::VideoFrameStats(stats) => {
                debug!(
                    period_ms = stats.period_ms,
                    frames_queued = stats.frames_queued,
                    frames_sent = stats.frames_sent,
                    bytes_queued = stats.bytes_queued,
                    bytes_sent = stats.bytes_sent,
                    bw_throttles = stats.bw_throttling_count,
                    queue_fill = stats.queue_fullness,
                    max_frame_size = stats.max_frame_size,
                    "video frame stats"
                );
                summary.get_or_insert_with(StatsSummary::default).fold_video(&stats);
            }
            StatusMessage::BitrateChanged(change) => {
                debug!(
                    "Bitrate change: type {}, reason {}, {} bps current, {} bps previous, \
                     {}, RTT {:.3} ms, {} frames dropped, queue fill level {:.3}",
                    change.change_type.as_str(),
                    change.reason.as_str(),
                    change.current_bps,
                    change.previous_bps,
                    change.nack_rate(),
                    change.avg_rtt_ms,
                    change.avg_frames_dropped,
                    change.queue_fullness
                );
            }
            StatusMessage::Other(kind) => {
                warn!("Unhandled status message type: {}", kind);
            }
        }
        false
    }

    fn handle_event(&self, event: &ConnectionEvent) -> bool {
        info!(
            "Event: {}, reason {}: {}",
            event.event_type,
            event.reason,
            self.link.describe(event.error_code)
        );

        if !event.is_unexpected_disconnect() {
            return false;
        }
        let err = SessionError::ConnectionLost {
            reason: event.reason,
            code: event.error_code,
            description: self.link.describe(event.error_code),
        };
        error!("{}", err);
        self.observer.error(&err);
        true
    }
}

fn forward_log(severity: LogSeverity, text: &str) {
    match severity.level() {
        LogLevel::Error => error!(target: INGEST_TARGET, "{}", text),
        LogLevel::Warning => warn!(target: INGEST_TARGET, "{}", text),
        LogLevel::Info => info!(target: INGEST_TARGET, "{}", text),
        LogLevel::Debug => debug!(target: INGEST_TARGET, "{}", text),
        LogLevel::Log => trace!(target: INGEST_TARGET, "{}", text),
    }
}

/// Handle to the running status loop.
///
/// Dropping the monitor stops and joins the loop.
pub struct StatusMonitor {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StatusMonitor {
    pub fn start(
        link: Arc<SessionLink>,
        observer: Arc<dyn SessionObserver>,
        poll_interval: Duration,
    ) -> Result<Self, SessionError> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let drain = StatusDrain::new(link, observer);

        let handle = thread::Builder::new()
            .name("ftl-status".into())
            .spawn(move || {
                debug!("status loop started");
                while running_clone.load(Ordering::Acquire) {
                    drain.pass(poll_interval);
                }
                debug!("status loop stopped");
            })
            .map_err(|e| SessionError::MonitorSpawn(e.to_string()))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signals the loop and waits for it to exit.
    pub fn stop(mut self) -> Result<(), SessionError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), SessionError> {
        self.running.store(false, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SessionError::MonitorJoin),
            None => Ok(()),
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!("{}", err);
        }
    }
}
