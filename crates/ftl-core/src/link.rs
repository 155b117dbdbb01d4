//! # Session Link
//!
//! Owns one ingest handle from creation to destruction and gates every
//! sender behind a shared connect decision.
//!
//! ```text
//!   create ──▶ Disconnected ◀──disconnect── Connected
//!                   │                          ▲
//!                   └────────ensure_connected──┘
//!   destroy (once, after disconnect)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::demux::{MediaUnit, UnitSink};
use crate::error::{ProviderCode, SessionError};
use crate::observer::SessionObserver;
use crate::provider::{IngestHandle, IngestProvider};
use crate::status::StatusMessage;
use crate::util::lock_or_recover;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

pub struct SessionLink {
    provider: Arc<dyn IngestProvider>,
    handle: Box<dyn IngestHandle>,
    observer: Arc<dyn SessionObserver>,
    /// Guards the connect/disconnect decision only; sends never take it.
    state: Mutex<ConnectionState>,
    destroyed: AtomicBool,
}

impl SessionLink {
    /// Creates the ingest handle. The stream key must be set.
    pub fn create(
        provider: Arc<dyn IngestProvider>,
        config: &SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, SessionError> {
        let params = config.ingest_params()?;
        let handle = provider.create(&params).map_err(|code| SessionError::Create {
            code,
            description: provider.describe(code).into_owned(),
        })?;
        info!(ingest = %params.ingest_hostname, peak_kbps = params.peak_kbps, "created ingest handle");

        Ok(Self {
            provider,
            handle,
            observer,
            state: Mutex::new(ConnectionState::Disconnected),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn describe(&self, code: ProviderCode) -> String {
        self.provider.describe(code).into_owned()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *lock_or_recover(&self.state)
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn check_alive(&self) -> Result<(), SessionError> {
        if self.is_destroyed() {
            Err(SessionError::HandleDestroyed)
        } else {
            Ok(())
        }
    }

    /// Connects unless already connected.
    ///
    /// Concurrent callers serialise on the connect lock, so at most one
    /// connect round-trip is in flight and the losers see its outcome.
    pub fn connect(&self) -> Result<(), SessionError> {
        self.check_alive()?;
        let mut state = lock_or_recover(&self.state);
        if *state == ConnectionState::Connected {
            return Ok(());
        }

        debug!("connecting to ingest");
        match self.handle.connect() {
            Ok(()) => {
                *state = ConnectionState::Connected;
                info!("connected to ingest");
                Ok(())
            }
            Err(code) => Err(SessionError::Connect {
                code,
                description: self.describe(code),
            }),
        }
    }

    /// Connection gate for senders.
    ///
    /// A failed attempt is reported to the observer and leaves the link
    /// disconnected; the next call tries again.
    pub fn ensure_connected(&self) -> bool {
        match self.connect() {
            Ok(()) => true,
            Err(err) => {
                error!("{}", err);
                self.observer.error(&err);
                false
            }
        }
    }

    /// Hands one unit to the provider. Does not connect or retry.
    pub fn send(&self, unit: &MediaUnit<'_>) -> Result<usize, SessionError> {
        self.check_alive()?;
        self.handle
            .send_media(unit.kind, unit.timestamp_us, unit.payload, unit.last_in_frame)
            .map_err(|code| SessionError::Send {
                code,
                description: self.describe(code),
            })
    }

    /// Disconnects if connected. Returns whether the link is now disconnected.
    ///
    /// Failures are logged and leave the state unchanged.
    pub fn disconnect(&self) -> bool {
        if self.is_destroyed() {
            return true;
        }
        let mut state = lock_or_recover(&self.state);
        if *state == ConnectionState::Disconnected {
            return true;
        }

        match self.handle.disconnect() {
            Ok(()) => {
                *state = ConnectionState::Disconnected;
                info!("disconnected from ingest");
                true
            }
            Err(code) => {
                let err = SessionError::Disconnect {
                    code,
                    description: self.describe(code),
                };
                warn!("{}", err);
                false
            }
        }
    }

    pub fn poll_status(&self, timeout: Duration) -> Result<Option<StatusMessage>, SessionError> {
        self.check_alive()?;
        self.handle
            .poll_status(timeout)
            .map_err(|code| SessionError::StatusPoll {
                code,
                description: self.describe(code),
            })
    }

    /// Destroys the handle. Only the first call reaches the provider.
    pub fn destroy(&self) -> Result<(), SessionError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(SessionError::HandleDestroyed);
        }
        if self.is_connected() {
            warn!("destroying ingest handle while connected");
            self.disconnect_before_destroy();
        }

        match self.handle.destroy() {
            Ok(()) => {
                debug!("destroyed ingest handle");
                Ok(())
            }
            Err(code) => Err(SessionError::Destroy {
                code,
                description: self.describe(code),
            }),
        }
    }

    fn disconnect_before_destroy(&self) {
        let mut state = lock_or_recover(&self.state);
        if let Err(code) = self.handle.disconnect() {
            warn!(
                "Failed to disconnect from ingest: {}",
                self.provider.describe(code)
            );
        }
        *state = ConnectionState::Disconnected;
    }
}

impl UnitSink for SessionLink {
    fn send_unit(&self, unit: &MediaUnit<'_>) -> Result<usize, SessionError> {
        self.send(unit)
    }
}

impl Drop for SessionLink {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            if let Err(err) = self.destroy() {
                error!("{}", err);
            }
        }
    }
}

impl std::fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLink")
            .field("state", &self.connection_state())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackProvider;
    use crate::observer::{ChannelObserver, SessionEvent};
    use crate::provider::MediaKind;

    fn link_with(provider: &LoopbackProvider) -> (SessionLink, crossbeam_channel::Receiver<SessionEvent>) {
        let (observer, rx) = ChannelObserver::new();
        let link = SessionLink::create(
            Arc::new(provider.clone()),
            &SessionConfig::new("test-key"),
            Arc::new(observer),
        )
        .unwrap();
        (link, rx)
    }

    #[test]
    fn create_requires_stream_key() {
        let provider = LoopbackProvider::new();
        let (observer, _rx) = ChannelObserver::new();
        let err = SessionLink::create(
            Arc::new(provider.clone()),
            &SessionConfig::default(),
            Arc::new(observer),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::MissingStreamKey));
        assert_eq!(provider.counters().creates, 0);
    }

    #[test]
    fn create_failure_is_described() {
        let provider = LoopbackProvider::new();
        provider.fail_next_create(ProviderCode(3));
        let (observer, _rx) = ChannelObserver::new();
        let err = SessionLink::create(
            Arc::new(provider.clone()),
            &SessionConfig::new("k"),
            Arc::new(observer),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Create { code: ProviderCode(3), .. }));
    }

    #[test]
    fn ensure_connected_is_idempotent() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        assert!(link.ensure_connected());
        assert!(link.ensure_connected());
        assert_eq!(provider.counters().connects, 1);
        assert_eq!(link.connection_state(), ConnectionState::Connected);
    }

    #[test]
    fn failed_connect_is_reported_and_retryable() {
        let provider = LoopbackProvider::new();
        provider.fail_next_connect(ProviderCode(14));
        let (link, rx) = link_with(&provider);

        assert!(!link.ensure_connected());
        assert_eq!(link.connection_state(), ConnectionState::Disconnected);
        match rx.try_recv().unwrap() {
            SessionEvent::Error(SessionError::Connect { code, .. }) => {
                assert_eq!(code, ProviderCode(14))
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert!(link.ensure_connected());
        assert_eq!(provider.counters().connects, 2);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        assert!(link.disconnect());
        assert_eq!(provider.counters().disconnects, 0);

        link.ensure_connected();
        assert!(link.disconnect());
        assert!(link.disconnect());
        assert_eq!(provider.counters().disconnects, 1);
    }

    #[test]
    fn failed_disconnect_keeps_state() {
        let provider = LoopbackProvider::new();
        let (link, rx) = link_with(&provider);
        link.ensure_connected();
        provider.fail_next_disconnect(ProviderCode(5));

        assert!(!link.disconnect());
        assert!(link.is_connected());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_forwards_unit_fields() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        link.ensure_connected();
        let sent = link
            .send(&MediaUnit {
                kind: MediaKind::Video,
                timestamp_us: 42,
                payload: &[0x65, 0x01],
                last_in_frame: true,
            })
            .unwrap();
        assert_eq!(sent, 2);

        let units = provider.sent_units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, MediaKind::Video);
        assert_eq!(units[0].timestamp_us, 42);
        assert!(units[0].end_of_frame);
    }

    #[test]
    fn send_failure_leaves_connection() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        link.ensure_connected();
        provider.fail_next_send(ProviderCode(21));
        let err = link
            .send(&MediaUnit {
                kind: MediaKind::Audio,
                timestamp_us: 0,
                payload: &[1],
                last_in_frame: true,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Send { .. }));
        assert!(link.is_connected());
    }

    #[test]
    fn destroy_happens_once() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        link.destroy().unwrap();
        assert!(matches!(link.destroy(), Err(SessionError::HandleDestroyed)));
        assert!(matches!(link.connect(), Err(SessionError::HandleDestroyed)));
        drop(link);
        assert_eq!(provider.counters().destroys, 1);
    }

    #[test]
    fn drop_destroys_handle() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        link.ensure_connected();
        drop(link);
        let counters = provider.counters();
        assert_eq!(counters.disconnects, 1);
        assert_eq!(counters.destroys, 1);
    }

    #[test]
    fn destroy_failure_is_reported() {
        let provider = LoopbackProvider::new();
        let (link, _rx) = link_with(&provider);
        provider.fail_next_destroy(ProviderCode(9));
        let err = link.destroy().unwrap_err();
        assert!(matches!(err, SessionError::Destroy { code: ProviderCode(9), .. }));
        assert!(link.is_destroyed());
    }
}
