//! # Frame Demuxing
//!
//! Turns encoded frames into the timestamped media units the ingest
//! protocol transmits. Video frames are split into NAL units; audio frames
//! are forwarded whole.

use tracing::{trace, warn};

use crate::error::SessionError;
use crate::nal::{self, NaluRecord, NAL_TYPE_AUD, NAL_TYPE_UNSPECIFIED};
use crate::provider::MediaKind;

/// A unit of media ready for the protocol. Borrows the frame it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaUnit<'a> {
    pub kind: MediaKind,
    pub timestamp_us: u64,
    pub payload: &'a [u8],
    pub last_in_frame: bool,
}

/// Destination of demuxed units.
pub trait UnitSink {
    /// Returns the number of bytes the destination accepted.
    fn send_unit(&self, unit: &MediaUnit<'_>) -> Result<usize, SessionError>;
}

/// What was forwarded for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub units: usize,
    pub bytes_sent: usize,
}

/// Splits Annex B video frames into NAL units.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDemuxer;

impl FrameDemuxer {
    /// Forwards every payload-bearing NAL unit of `frame` to `sink`.
    ///
    /// The frame is validated before anything is sent: a unit of type 0
    /// rejects the whole frame, and a frame holding nothing but access unit
    /// delimiters fails with [`SessionError::NoAccessUnit`]. The last
    /// forwarded unit carries `last_in_frame`.
    pub fn demux(
        &self,
        frame: &[u8],
        timestamp_us: u64,
        sink: &dyn UnitSink,
    ) -> Result<FrameReport, SessionError> {
        let mut forwarded: Vec<NaluRecord> = Vec::new();
        for record in nal::scan(frame) {
            match record.unit_type {
                NAL_TYPE_UNSPECIFIED => {
                    return Err(SessionError::InvalidUnitType {
                        unit_type: record.unit_type,
                    });
                }
                NAL_TYPE_AUD => {
                    trace!(size = record.len(), "skipping AU delimiter");
                }
                _ => forwarded.push(record),
            }
        }

        if forwarded.is_empty() {
            return Err(SessionError::NoAccessUnit);
        }

        let mut report = FrameReport::default();
        let mut first_error: Option<SessionError> = None;
        let count = forwarded.len();
        for (idx, record) in forwarded.iter().enumerate() {
            let last_in_frame = idx + 1 == count;
            let unit = MediaUnit {
                kind: MediaKind::Video,
                timestamp_us,
                payload: record.payload(frame),
                last_in_frame,
            };
            // A failed unit is dropped; the rest of the frame still goes out
            // so the ingest sees the frame end.
            match sink.send_unit(&unit) {
                Ok(sent) => {
                    trace!(
                        sent,
                        nal_type = record.unit_type,
                        size = record.len(),
                        last = last_in_frame,
                        timestamp_us,
                        "sent NALU"
                    );
                    report.units += 1;
                    report.bytes_sent += sent;
                }
                Err(err) => {
                    warn!(
                        nal_type = record.unit_type,
                        size = record.len(),
                        last = last_in_frame,
                        "dropping NALU: {}",
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        trace!(units = report.units, bytes = report.bytes_sent, "sent frame");
        Ok(report)
    }
}

/// Capability shared by the audio and video delivery paths.
///
/// `timestamp_us` is the frame's running time in microseconds.
pub trait MediaRenderer: Send + Sync {
    fn render(
        &self,
        sink: &dyn UnitSink,
        frame: &[u8],
        timestamp_us: u64,
    ) -> Result<FrameReport, SessionError>;
}

#[derive(Debug, Default)]
pub struct VideoRenderer {
    demuxer: FrameDemuxer,
}

impl MediaRenderer for VideoRenderer {
    fn render(
        &self,
        sink: &dyn UnitSink,
        frame: &[u8],
        timestamp_us: u64,
    ) -> Result<FrameReport, SessionError> {
        self.demuxer.demux(frame, timestamp_us, sink)
    }
}

/// Sends each audio frame as a single, frame-ending unit.
#[derive(Debug, Default)]
pub struct AudioRenderer;

impl MediaRenderer for AudioRenderer {
    fn render(
        &self,
        sink: &dyn UnitSink,
        frame: &[u8],
        timestamp_us: u64,
    ) -> Result<FrameReport, SessionError> {
        trace!(size = frame.len(), timestamp_us, "sending audio");
        let sent = sink.send_unit(&MediaUnit {
            kind: MediaKind::Audio,
            timestamp_us,
            payload: frame,
            last_in_frame: true,
        })?;
        trace!(sent, "sent audio");
        Ok(FrameReport {
            units: 1,
            bytes_sent: sent,
        })
    }
}
