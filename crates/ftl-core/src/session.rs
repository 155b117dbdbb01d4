//! # Session Lifecycle
//!
//! Sequences handle creation, the status monitor and the connection:
//!
//! ```text
//!   Null ──prepare──▶ Ready ──activate──▶ Active
//!    ▲                  │ ▲                  │
//!    └─────release──────┘ └────deactivate────┘
//! ```
//!
//! The handle exists before the monitor starts and is destroyed only after
//! the monitor has been joined, so the status loop never sees a missing
//! handle. With `async-connect` set, `activate` connects eagerly; otherwise
//! the first media send connects. A bad stream key is therefore only
//! discovered by the first connect attempt, not by `prepare`.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tracing::{debug, error, warn};

use crate::config::{RuntimeSettings, SessionConfig};
use crate::demux::{AudioRenderer, FrameReport, MediaRenderer, VideoRenderer};
use crate::error::{ErrorKind, SessionError};
use crate::link::SessionLink;
use crate::monitor::{StatusMonitor, STATUS_POLL_INTERVAL};
use crate::observer::SessionObserver;
use crate::provider::{IngestProvider, MediaKind};
use crate::util::lock_or_recover;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Null,
    Ready,
    /// Paused or playing; the protocol does not distinguish them.
    Active,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Null => "null",
            SessionState::Ready => "ready",
            SessionState::Active => "active",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NullToReady,
    ReadyToActive,
    ActiveToReady,
    ReadyToNull,
}

pub struct Session {
    provider: Arc<dyn IngestProvider>,
    observer: Arc<dyn SessionObserver>,
    config: SessionConfig,
    runtime: Mutex<RuntimeSettings>,
    state: Mutex<SessionState>,
    link: ArcSwapOption<SessionLink>,
    monitor: Mutex<Option<StatusMonitor>>,
    poll_interval: Duration,
    audio: AudioRenderer,
    video: VideoRenderer,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn IngestProvider>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let runtime = RuntimeSettings::from(&config);
        Self {
            provider,
            observer,
            config,
            runtime: Mutex::new(runtime),
            state: Mutex::new(SessionState::Null),
            link: ArcSwapOption::empty(),
            monitor: Mutex::new(None),
            poll_interval: STATUS_POLL_INTERVAL,
            audio: AudioRenderer,
            video: VideoRenderer::default(),
        }
    }

    /// Overrides the status poll interval (and so the stop latency).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *lock_or_recover(&self.state)
    }

    pub fn sync(&self) -> bool {
        lock_or_recover(&self.runtime).sync
    }

    pub fn set_sync(&self, sync: bool) {
        lock_or_recover(&self.runtime).sync = sync;
    }

    pub fn peak_kbps(&self) -> u32 {
        lock_or_recover(&self.runtime).peak_kbps
    }

    /// Takes effect the next time a handle is created.
    pub fn set_peak_kbps(&self, peak_kbps: u32) {
        lock_or_recover(&self.runtime).peak_kbps = peak_kbps;
    }

    pub fn link(&self) -> Option<Arc<SessionLink>> {
        self.link.load_full()
    }

    pub fn monitor_running(&self) -> bool {
        lock_or_recover(&self.monitor)
            .as_ref()
            .map(StatusMonitor::is_running)
            .unwrap_or(false)
    }

    /// Reports an error through the observer without failing anything.
    pub fn report(&self, err: &SessionError) {
        self.observer.error(err);
    }

    pub fn change_state(&self, transition: Transition) -> Result<(), SessionError> {
        debug!(?transition, "changing state");
        match transition {
            Transition::NullToReady => self.prepare(),
            Transition::ReadyToActive => self.activate(),
            Transition::ActiveToReady => self.deactivate(),
            Transition::ReadyToNull => self.release(),
        }
    }

    fn expect_state(state: SessionState, expected: SessionState) -> Result<(), SessionError> {
        if state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: state.as_str(),
            })
        }
    }

    /// Null → Ready: creates the ingest handle.
    pub fn prepare(&self) -> Result<(), SessionError> {
        let mut state = lock_or_recover(&self.state);
        Self::expect_state(*state, SessionState::Null)?;

        let runtime = *lock_or_recover(&self.runtime);
        let config = self
            .config
            .clone()
            .with_peak_kbps(runtime.peak_kbps)
            .with_sync(runtime.sync);
        let link = SessionLink::create(self.provider.clone(), &config, self.observer.clone())
            .inspect_err(|err| error!("{}", err))?;

        self.link.store(Some(Arc::new(link)));
        *state = SessionState::Ready;
        Ok(())
    }

    /// Ready → Active: starts the status monitor, connecting eagerly if
    /// configured to.
    ///
    /// A failed eager connect is returned, not reported to the observer.
    pub fn activate(&self) -> Result<(), SessionError> {
        let mut state = lock_or_recover(&self.state);
        Self::expect_state(*state, SessionState::Ready)?;
        let link = self.link().ok_or(SessionError::NoHandle)?;

        let monitor = StatusMonitor::start(link.clone(), self.observer.clone(), self.poll_interval)
            .inspect_err(|err| error!("{}", err))?;

        if self.config.async_connect {
            if let Err(err) = link.connect() {
                error!("{}", err);
                if let Err(join_err) = monitor.stop() {
                    error!("{}", join_err);
                }
                return Err(err);
            }
        }

        *lock_or_recover(&self.monitor) = Some(monitor);
        *state = SessionState::Active;
        Ok(())
    }

    /// Active → Ready: disconnects, then stops and joins the monitor.
    ///
    /// The surrounding element runs its own teardown before calling this.
    /// A failed disconnect is logged and does not stop the transition.
    pub fn deactivate(&self) -> Result<(), SessionError> {
        let mut state = lock_or_recover(&self.state);
        Self::expect_state(*state, SessionState::Active)?;

        if let Some(link) = self.link() {
            if !link.disconnect() {
                warn!("continuing teardown with ingest still connected");
            }
        }

        let monitor = lock_or_recover(&self.monitor).take();
        if let Some(monitor) = monitor {
            monitor.stop().inspect_err(|err| error!("{}", err))?;
        }

        *state = SessionState::Ready;
        Ok(())
    }

    /// Ready → Null: destroys the handle.
    ///
    /// The handle is released even if the provider reports a failure; the
    /// error is returned so the transition can fail.
    pub fn release(&self) -> Result<(), SessionError> {
        let mut state = lock_or_recover(&self.state);
        Self::expect_state(*state, SessionState::Ready)?;

        let result = match self.link.swap(None) {
            Some(link) => link.destroy(),
            None => Ok(()),
        };
        *state = SessionState::Null;
        result.inspect_err(|err| error!("{}", err))
    }

    /// Connection gate shared by both media paths.
    pub fn ensure_connected(&self) -> bool {
        match self.link() {
            Some(link) => link.ensure_connected(),
            None => {
                self.report(&SessionError::NoHandle);
                false
            }
        }
    }

    /// Sends one frame of `kind` at running time `timestamp_us`.
    ///
    /// Fails with `NotConnected` unless the session is Active. Decode
    /// failures are reported to the observer, since they stop the stream;
    /// send failures only concern this frame and are returned.
    pub fn render(
        &self,
        kind: MediaKind,
        frame: &[u8],
        timestamp_us: u64,
    ) -> Result<FrameReport, SessionError> {
        let link = self.link().ok_or(SessionError::NoHandle)?;
        if self.state() != SessionState::Active {
            return Err(SessionError::NotConnected);
        }
        if !link.ensure_connected() {
            return Err(SessionError::NotConnected);
        }

        let renderer: &dyn MediaRenderer = match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        };
        renderer
            .render(link.as_ref(), frame, timestamp_us)
            .inspect_err(|err| {
                if err.kind() == ErrorKind::Decode {
                    error!("{}", err);
                    self.observer.error(err);
                }
            })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(monitor) = lock_or_recover(&self.monitor).take() {
            if let Err(err) = monitor.stop() {
                error!("{}", err);
            }
        }
        if let Some(link) = self.link.swap(None) {
            link.disconnect();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("link", &self.link())
            .finish()
    }
}
