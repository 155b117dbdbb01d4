//! Outward notifications of a session: stats summaries and reported errors.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{error, info};

use crate::error::SessionError;
use crate::stats::StatsSummary;

pub trait SessionObserver: Send + Sync {
    /// Called once per status poll pass that drained at least one counter.
    fn stats(&self, summary: &StatsSummary);

    /// Called for every error the session reports instead of returning.
    fn error(&self, error: &SessionError);
}

/// Logs notifications and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn stats(&self, summary: &StatsSummary) {
        info!(?summary, "ftl stats");
    }

    fn error(&self, err: &SessionError) {
        error!(kind = ?err.kind(), "{}", err);
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Stats(StatsSummary),
    Error(SessionError),
}

/// Forwards notifications into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn stats(&self, summary: &StatsSummary) {
        let _ = self.tx.send(SessionEvent::Stats(summary.clone()));
    }

    fn error(&self, error: &SessionError) {
        let _ = self.tx.send(SessionEvent::Error(error.clone()));
    }
}
