//! Error taxonomy of the session engine.

use std::fmt;

use thiserror::Error;

use crate::status::EventReason;

/// Opaque status code returned by the ingest provider.
///
/// The core never interprets the value; it is rendered to text through
/// [`IngestProvider::describe`](crate::provider::IngestProvider::describe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderCode(pub i32);

impl fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse classification used by callers to decide on propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing configuration. Fatal at handle creation.
    Config,
    /// Connection could not be established. The caller may retry.
    Connect,
    /// A single media unit could not be sent.
    Send,
    /// Malformed media buffer. The buffer is dropped and the stream stops.
    Decode,
    /// Disconnect or destroy failure.
    Teardown,
    /// The ingest dropped the connection without being asked to.
    ProtocolFatal,
    /// Misuse of the lifecycle or background worker failures.
    Lifecycle,
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("stream key is not set")]
    MissingStreamKey,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to create ingest handle: {description} (status code {code})")]
    Create {
        code: ProviderCode,
        description: String,
    },

    #[error("failed to connect to ingest: {description} (status code {code})")]
    Connect {
        code: ProviderCode,
        description: String,
    },

    #[error("not connected to ingest")]
    NotConnected,

    #[error("failed to send media: {description} (status code {code})")]
    Send {
        code: ProviderCode,
        description: String,
    },

    #[error("no NALU in buffer")]
    NoAccessUnit,

    #[error("invalid NALU type {unit_type}")]
    InvalidUnitType { unit_type: u8 },

    #[error("got buffer without {0}")]
    MissingTimestamp(&'static str),

    #[error("failed to map buffer")]
    BufferMap,

    #[error("failed to disconnect from ingest: {description} (status code {code})")]
    Disconnect {
        code: ProviderCode,
        description: String,
    },

    #[error("failed to destroy ingest handle: {description} (status code {code})")]
    Destroy {
        code: ProviderCode,
        description: String,
    },

    #[error("ingest handle already destroyed")]
    HandleDestroyed,

    #[error("ingest handle not created")]
    NoHandle,

    #[error("FTL connection unexpectedly terminated: reason {reason}: {description}")]
    ConnectionLost {
        reason: EventReason,
        code: ProviderCode,
        description: String,
    },

    #[error("failed to start status task: {0}")]
    MonitorSpawn(String),

    #[error("failed to join status task")]
    MonitorJoin,

    #[error("failed to get status: {description} (status code {code})")]
    StatusPoll {
        code: ProviderCode,
        description: String,
    },

    #[error("invalid state transition from {from}")]
    InvalidTransition { from: &'static str },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::MissingStreamKey | SessionError::Config(_) => ErrorKind::Config,
            SessionError::Create { .. } => ErrorKind::Config,
            SessionError::Connect { .. } | SessionError::NotConnected => ErrorKind::Connect,
            SessionError::Send { .. } => ErrorKind::Send,
            SessionError::NoAccessUnit
            | SessionError::InvalidUnitType { .. }
            | SessionError::MissingTimestamp(_)
            | SessionError::BufferMap => ErrorKind::Decode,
            SessionError::Disconnect { .. } | SessionError::Destroy { .. } => ErrorKind::Teardown,
            SessionError::ConnectionLost { .. } => ErrorKind::ProtocolFatal,
            SessionError::HandleDestroyed
            | SessionError::NoHandle
            | SessionError::MonitorSpawn(_)
            | SessionError::MonitorJoin
            | SessionError::StatusPoll { .. }
            | SessionError::InvalidTransition { .. } => ErrorKind::Lifecycle,
        }
    }

    /// Provider status code attached to this error, if any.
    pub fn provider_code(&self) -> Option<ProviderCode> {
        match self {
            SessionError::Create { code, .. }
            | SessionError::Connect { code, .. }
            | SessionError::Send { code, .. }
            | SessionError::Disconnect { code, .. }
            | SessionError::Destroy { code, .. }
            | SessionError::ConnectionLost { code, .. }
            | SessionError::StatusPoll { code, .. } => Some(*code),
            _ => None,
        }
    }
}
