//! Seam to the streaming-protocol library that owns the network transport.

use std::borrow::Cow;
use std::time::Duration;

use crate::error::ProviderCode;
use crate::status::StatusMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Opus,
}

/// Parameters handed to the provider when a session handle is created.
#[derive(Clone, PartialEq, Eq)]
pub struct IngestParams {
    pub ingest_hostname: String,
    pub stream_key: String,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub peak_kbps: u32,
    /// Frame rate is not known up front; 0/1 lets the ingest measure it.
    pub fps_num: u32,
    pub fps_den: u32,
    pub vendor_name: String,
    pub vendor_version: String,
}

impl std::fmt::Debug for IngestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestParams")
            .field("ingest_hostname", &self.ingest_hostname)
            .field("stream_key", &"<redacted>")
            .field("video_codec", &self.video_codec)
            .field("audio_codec", &self.audio_codec)
            .field("peak_kbps", &self.peak_kbps)
            .field("fps_num", &self.fps_num)
            .field("fps_den", &self.fps_den)
            .field("vendor_name", &self.vendor_name)
            .field("vendor_version", &self.vendor_version)
            .finish()
    }
}

/// Factory side of the streaming-protocol library.
pub trait IngestProvider: Send + Sync {
    fn create(&self, params: &IngestParams) -> Result<Box<dyn IngestHandle>, ProviderCode>;

    /// Human-readable text for a provider status code.
    fn describe(&self, code: ProviderCode) -> Cow<'static, str>;
}

/// One ingest session handle.
///
/// Implementations must allow `send_media` to run concurrently with itself
/// and with `poll_status`; the core adds no locking around either.
pub trait IngestHandle: Send + Sync {
    fn connect(&self) -> Result<(), ProviderCode>;

    fn disconnect(&self) -> Result<(), ProviderCode>;

    fn destroy(&self) -> Result<(), ProviderCode>;

    /// Returns the number of bytes queued for transmission.
    fn send_media(
        &self,
        kind: MediaKind,
        timestamp_us: u64,
        payload: &[u8],
        end_of_frame: bool,
    ) -> Result<usize, ProviderCode>;

    /// Waits up to `timeout` for the next status message.
    ///
    /// `Ok(None)` means the queue stayed empty for the whole timeout.
    fn poll_status(&self, timeout: Duration) -> Result<Option<StatusMessage>, ProviderCode>;
}
