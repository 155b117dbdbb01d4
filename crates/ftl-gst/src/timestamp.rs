//! Buffer timestamps to session running time.
//!
//! Video is timed by decode order, so it needs the DTS. Audio has no
//! reordering and falls back to the PTS. Both go through the segment before
//! being handed to the session in microseconds.

use ftl_core::SessionError;

type Segment = gst::FormattedSegment<gst::ClockTime>;

fn running_time(segment: &Segment, ts: gst::ClockTime) -> Result<gst::ClockTime, SessionError> {
    segment
        .to_running_time(ts)
        .ok_or(SessionError::MissingTimestamp("running time"))
}

/// Running time of a video buffer in microseconds, rounded to nearest.
pub fn video_running_time_us(
    buffer: &gst::BufferRef,
    segment: &Segment,
) -> Result<u64, SessionError> {
    let dts = buffer.dts().ok_or(SessionError::MissingTimestamp("DTS"))?;
    let ns = running_time(segment, dts)?.nseconds();
    Ok(ns.saturating_add(500) / 1_000)
}

/// Running time of an audio buffer in microseconds, truncated.
pub fn audio_running_time_us(
    buffer: &gst::BufferRef,
    segment: &Segment,
) -> Result<u64, SessionError> {
    let ts = buffer
        .dts_or_pts()
        .ok_or(SessionError::MissingTimestamp("DTS or PTS"))?;
    Ok(running_time(segment, ts)?.useconds())
}
