//! Session adapter for an FTL sink element.
//!
//! The element owns an [`FtlSink`] and forwards its render and state
//! change calls into it:
//!
//! ```text
//!   NULL ──▶ READY       prepare    (before parent)
//!   READY ──▶ PAUSED     activate   (before parent)
//!   PAUSED ──▶ READY     deactivate (after parent)
//!   READY ──▶ NULL       release    (after parent)
//! ```

use std::sync::Arc;

use ftl_core::demux::FrameReport;
use ftl_core::{
    ErrorKind, IngestProvider, MediaKind, Session, SessionConfig, SessionError, SessionObserver,
    Transition,
};
use gst::prelude::*;

use crate::message::ElementObserver;
use crate::timestamp;

type Segment = gst::FormattedSegment<gst::ClockTime>;

pub struct FtlSink {
    session: Session,
}

impl FtlSink {
    /// Creates a sink that posts stats and errors on `element`'s bus.
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn IngestProvider>,
        element: &impl IsA<gst::Element>,
    ) -> Self {
        Self::with_observer(config, provider, Arc::new(ElementObserver::new(element)))
    }

    pub fn with_observer(
        config: SessionConfig,
        provider: Arc<dyn IngestProvider>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            session: Session::new(config, provider, observer),
        }
    }

    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether buffers should be synchronised against the clock.
    pub fn sync(&self) -> bool {
        self.session.sync()
    }

    pub fn render_video(
        &self,
        buffer: &gst::BufferRef,
        segment: &Segment,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let timestamp_us =
            timestamp::video_running_time_us(buffer, segment).map_err(|e| self.stream_error(e))?;
        let map = buffer
            .map_readable()
            .map_err(|_| self.stream_error(SessionError::BufferMap))?;
        self.deliver(MediaKind::Video, &map, timestamp_us)
    }

    pub fn render_audio(
        &self,
        buffer: &gst::BufferRef,
        segment: &Segment,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let timestamp_us =
            timestamp::audio_running_time_us(buffer, segment).map_err(|e| self.stream_error(e))?;
        let map = buffer
            .map_readable()
            .map_err(|_| self.stream_error(SessionError::BufferMap))?;
        self.deliver(MediaKind::Audio, &map, timestamp_us)
    }

    fn stream_error(&self, err: SessionError) -> gst::FlowError {
        self.session.report(&err);
        gst::FlowError::Error
    }

    /// A failed send drops the frame and keeps the stream going; anything
    /// else stops it. Decode and connect failures have already been
    /// reported by the session.
    fn deliver(
        &self,
        kind: MediaKind,
        data: &[u8],
        timestamp_us: u64,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        match self.session.render(kind, data, timestamp_us) {
            Ok(FrameReport { units, bytes_sent }) => {
                gst::log!(
                    gst::CAT_DEFAULT,
                    "sent {} frame at {} us: {} units, {} bytes",
                    kind.as_str(),
                    timestamp_us,
                    units,
                    bytes_sent
                );
                Ok(gst::FlowSuccess::Ok)
            }
            Err(err) if err.kind() == ErrorKind::Send => {
                gst::warning!(gst::CAT_DEFAULT, "dropping {} frame: {}", kind.as_str(), err);
                Ok(gst::FlowSuccess::Ok)
            }
            Err(err) => {
                gst::error!(gst::CAT_DEFAULT, "{}", err);
                Err(gst::FlowError::Error)
            }
        }
    }

    fn apply(&self, transition: Transition) -> Result<(), gst::StateChangeError> {
        self.session.change_state(transition).map_err(|err| {
            self.session.report(&err);
            gst::StateChangeError
        })
    }

    /// Runs the session hooks around the parent's state change.
    pub fn change_state<F>(
        &self,
        transition: gst::StateChange,
        parent: F,
    ) -> Result<gst::StateChangeSuccess, gst::StateChangeError>
    where
        F: FnOnce(gst::StateChange) -> Result<gst::StateChangeSuccess, gst::StateChangeError>,
    {
        gst::debug!(gst::CAT_DEFAULT, "changing state: {:?}", transition);
        match transition {
            gst::StateChange::NullToReady => self.apply(Transition::NullToReady)?,
            gst::StateChange::ReadyToPaused => self.apply(Transition::ReadyToActive)?,
            _ => (),
        }

        let success = parent(transition)?;

        match transition {
            gst::StateChange::PausedToReady => self.apply(Transition::ActiveToReady)?,
            gst::StateChange::ReadyToNull => self.apply(Transition::ReadyToNull)?,
            _ => (),
        }
        Ok(success)
    }
}

impl std::fmt::Debug for FtlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtlSink")
            .field("session", &self.session)
            .finish()
    }
}
