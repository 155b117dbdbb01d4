//! # Ingest Status Messages
//!
//! Typed form of the messages the ingest library queues for the status
//! loop: log lines, connection events, periodic packet/frame counters and
//! encoder bitrate recommendations.
//!
//! Raw values follow the ingest library's C enums, so a provider backed by
//! FFI can convert with the `from_raw` helpers.

use std::fmt;

use crate::error::ProviderCode;

// ─── Message Kinds ──────────────────────────────────────────────────────────

/// Kind tag of a status message, including the kinds the monitor ignores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    None,
    Log,
    Event,
    VideoPackets,
    VideoPacketsInstant,
    AudioPackets,
    Video,
    Audio,
    FramesDropped,
    Network,
    BitrateChanged,
    Unrecognized(i32),
}

impl StatusKind {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => StatusKind::None,
            1 => StatusKind::Log,
            2 => StatusKind::Event,
            3 => StatusKind::VideoPackets,
            4 => StatusKind::VideoPacketsInstant,
            5 => StatusKind::AudioPackets,
            6 => StatusKind::Video,
            7 => StatusKind::Audio,
            8 => StatusKind::FramesDropped,
            9 => StatusKind::Network,
            10 => StatusKind::BitrateChanged,
            other => StatusKind::Unrecognized(other),
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            StatusKind::None => 0,
            StatusKind::Log => 1,
            StatusKind::Event => 2,
            StatusKind::VideoPackets => 3,
            StatusKind::VideoPacketsInstant => 4,
            StatusKind::AudioPackets => 5,
            StatusKind::Video => 6,
            StatusKind::Audio => 7,
            StatusKind::FramesDropped => 8,
            StatusKind::Network => 9,
            StatusKind::BitrateChanged => 10,
            StatusKind::Unrecognized(raw) => *raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::None => "none",
            StatusKind::Log => "log",
            StatusKind::Event => "event",
            StatusKind::VideoPackets => "video-packets",
            StatusKind::VideoPacketsInstant => "video-packets-instant",
            StatusKind::AudioPackets => "audio-packets",
            StatusKind::Video => "video",
            StatusKind::Audio => "audio",
            StatusKind::FramesDropped => "frames-dropped",
            StatusKind::Network => "network",
            StatusKind::BitrateChanged => "bitrate-changed",
            StatusKind::Unrecognized(_) => "<unknown>",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.as_raw())
    }
}

// ─── Log Severity ───────────────────────────────────────────────────────────

/// Severity attached to a log line emitted by the ingest library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Critical,
    Error,
    Warn,
    Info,
    Debug,
    Unrecognized(i32),
}

impl LogSeverity {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => LogSeverity::Critical,
            2 => LogSeverity::Error,
            3 => LogSeverity::Warn,
            4 => LogSeverity::Info,
            5 => LogSeverity::Debug,
            other => LogSeverity::Unrecognized(other),
        }
    }

    /// Level the forwarded line is logged at.
    pub fn level(&self) -> LogLevel {
        match self {
            LogSeverity::Critical | LogSeverity::Error => LogLevel::Error,
            LogSeverity::Warn => LogLevel::Warning,
            LogSeverity::Info => LogLevel::Info,
            LogSeverity::Debug => LogLevel::Debug,
            LogSeverity::Unrecognized(_) => LogLevel::Log,
        }
    }
}

/// Log-level taxonomy of the status monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    Log,
}

// ─── Connection Events ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Unknown,
    Connected,
    Disconnected,
    Destroyed,
    IngestErrorCode,
}

impl EventType {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => EventType::Connected,
            2 => EventType::Disconnected,
            3 => EventType::Destroyed,
            4 => EventType::IngestErrorCode,
            _ => EventType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Unknown => "unknown",
            EventType::Connected => "connected",
            EventType::Disconnected => "disconnected",
            EventType::Destroyed => "destroyed",
            EventType::IngestErrorCode => "ingest-error-code",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReason {
    None,
    NoMedia,
    ApiRequest,
    Unknown,
}

impl EventReason {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => EventReason::None,
            1 => EventReason::NoMedia,
            2 => EventReason::ApiRequest,
            _ => EventReason::Unknown,
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            EventReason::None => 0,
            EventReason::NoMedia => 1,
            EventReason::ApiRequest => 2,
            EventReason::Unknown => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventReason::None => "none",
            EventReason::NoMedia => "no-media",
            EventReason::ApiRequest => "api-request",
            EventReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state change reported by the ingest library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub event_type: EventType,
    pub reason: EventReason,
    pub error_code: ProviderCode,
}

impl ConnectionEvent {
    /// True when the ingest dropped the connection without a local request.
    pub fn is_unexpected_disconnect(&self) -> bool {
        self.event_type == EventType::Disconnected && self.reason != EventReason::ApiRequest
    }
}

// ─── Counters ───────────────────────────────────────────────────────────────

/// Cumulative packet counters. Covers both streams despite the name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketStats {
    pub period_ms: i64,
    pub sent: i64,
    pub nack_requests: i64,
    pub lost: i64,
    pub recovered: i64,
    pub late: i64,
}

/// Round-trip and transmit delay over the last interval, in ms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstantPacketStats {
    pub period_ms: i64,
    pub min_rtt: i32,
    pub max_rtt: i32,
    pub avg_rtt: i32,
    pub min_xmit_delay: i32,
    pub max_xmit_delay: i32,
    pub avg_xmit_delay: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoFrameStats {
    pub period_ms: i64,
    pub frames_queued: i64,
    pub frames_sent: i64,
    pub bytes_queued: i64,
    pub bytes_sent: i64,
    pub bw_throttling_count: i64,
    pub queue_fullness: i32,
    pub max_frame_size: i32,
}

// ─── Bitrate Changes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateChangeType {
    Decreased,
    Increased,
    Stabilized,
}

impl BitrateChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateChangeType::Decreased => "decreased",
            BitrateChangeType::Increased => "increased",
            BitrateChangeType::Stabilized => "stabilized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateChangeReason {
    BandwidthConstrained,
    UpgradeExcessive,
    BandwidthAvailable,
    StabilizeOnLowerBitrate,
    StabilizeOnOriginalBitrate,
}

impl BitrateChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateChangeReason::BandwidthConstrained => "bandwidth-constrained",
            BitrateChangeReason::UpgradeExcessive => "upgrade-excessive",
            BitrateChangeReason::BandwidthAvailable => "bandwidth-available",
            BitrateChangeReason::StabilizeOnLowerBitrate => "stabilize-on-lower-bitrate",
            BitrateChangeReason::StabilizeOnOriginalBitrate => "stabilize-on-original-bitrate",
        }
    }
}

/// Encoder bitrate recommendation from the ingest library's adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateChange {
    pub change_type: BitrateChangeType,
    pub reason: BitrateChangeReason,
    pub current_bps: u64,
    pub previous_bps: u64,
    pub nacks_to_frames_ratio: f64,
    pub avg_rtt_ms: f64,
    pub avg_frames_dropped: u64,
    pub queue_fullness: f64,
}

impl BitrateChange {
    pub fn nack_rate(&self) -> NackRate {
        NackRate::from_ratio(self.nacks_to_frames_ratio)
    }
}

/// Human-readable form of a NACK-to-frame ratio.
///
/// Ratios strictly between 0 and 1 are inverted and reported as frames per
/// NACK; anything else is reported as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NackRate {
    NacksPerFrame(f64),
    FramesPerNack(f64),
}

impl NackRate {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.0 && ratio < 1.0 {
            NackRate::FramesPerNack(1.0 / ratio)
        } else {
            NackRate::NacksPerFrame(ratio)
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            NackRate::NacksPerFrame(v) | NackRate::FramesPerNack(v) => *v,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            NackRate::NacksPerFrame(_) => "nacks per frame",
            NackRate::FramesPerNack(_) => "frames per nack",
        }
    }
}

impl fmt::Display for NackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value();
        if value.fract() == 0.0 {
            write!(f, "{:.0} {}", value, self.unit())
        } else {
            write!(f, "{:.3} {}", value, self.unit())
        }
    }
}

// ─── Message ────────────────────────────────────────────────────────────────

/// One decoded message from the status queue.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    Log {
        severity: LogSeverity,
        message: String,
    },
    Event(ConnectionEvent),
    PacketStats(PacketStats),
    InstantPacketStats(InstantPacketStats),
    VideoFrameStats(VideoFrameStats),
    BitrateChanged(BitrateChange),
    /// Kinds the monitor does not decode.
    Other(StatusKind),
}

impl StatusMessage {
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusMessage::Log { .. } => StatusKind::Log,
            StatusMessage::Event(_) => StatusKind::Event,
            StatusMessage::PacketStats(_) => StatusKind::VideoPackets,
            StatusMessage::InstantPacketStats(_) => StatusKind::VideoPacketsInstant,
            StatusMessage::VideoFrameStats(_) => StatusKind::Video,
            StatusMessage::BitrateChanged(_) => StatusKind::BitrateChanged,
            StatusMessage::Other(kind) => *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nack_ratio_below_one_is_inverted() {
        let rate = NackRate::from_ratio(0.25);
        assert_eq!(rate, NackRate::FramesPerNack(4.0));
        assert_eq!(rate.to_string(), "4 frames per nack");
    }

    #[test]
    fn nack_ratio_above_one_is_kept() {
        let rate = NackRate::from_ratio(4.0);
        assert_eq!(rate, NackRate::NacksPerFrame(4.0));
        assert_eq!(rate.to_string(), "4 nacks per frame");
    }

    #[test]
    fn nack_ratio_zero_and_one_are_not_inverted() {
        assert_eq!(NackRate::from_ratio(0.0), NackRate::NacksPerFrame(0.0));
        assert_eq!(NackRate::from_ratio(1.0), NackRate::NacksPerFrame(1.0));
    }

    #[test]
    fn fractional_rate_keeps_three_decimals() {
        assert_eq!(NackRate::from_ratio(0.3).to_string(), "3.333 frames per nack");
    }

    #[test]
    fn severity_maps_to_five_levels() {
        assert_eq!(LogSeverity::Critical.level(), LogLevel::Error);
        assert_eq!(LogSeverity::Error.level(), LogLevel::Error);
        assert_eq!(LogSeverity::Warn.level(), LogLevel::Warning);
        assert_eq!(LogSeverity::Info.level(), LogLevel::Info);
        assert_eq!(LogSeverity::Debug.level(), LogLevel::Debug);
        assert_eq!(LogSeverity::from_raw(42).level(), LogLevel::Log);
    }

    #[test]
    fn unexpected_disconnect_excludes_api_requests() {
        let mut event = ConnectionEvent {
            event_type: EventType::Disconnected,
            reason: EventReason::NoMedia,
            error_code: ProviderCode(0),
        };
        assert!(event.is_unexpected_disconnect());

        event.reason = EventReason::ApiRequest;
        assert!(!event.is_unexpected_disconnect());

        event.event_type = EventType::Connected;
        event.reason = EventReason::None;
        assert!(!event.is_unexpected_disconnect());
    }

    #[test]
    fn status_kind_roundtrips_raw_values() {
        for raw in 0..=10 {
            assert_eq!(StatusKind::from_raw(raw).as_raw(), raw);
        }
        let unknown = StatusKind::from_raw(99);
        assert_eq!(unknown.as_str(), "<unknown>");
        assert_eq!(unknown.to_string(), "<unknown> (99)");
    }
}
