use serde::Deserialize;

use crate::error::SessionError;
use crate::provider::{AudioCodec, IngestParams, VideoCodec};

pub const CONFIG_VERSION: u32 = 1;

/// Hostname value that lets the ingest library pick its default endpoint.
pub const AUTO_INGEST: &str = "auto";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfigInput {
    pub version: u32,
    pub ingest_hostname: Option<String>,
    pub stream_key: Option<String>,
    pub peak_kbps: Option<u32>,
    pub sync: Option<bool>,
    pub async_connect: Option<bool>,
}

/// Settings a session handle is created from.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub ingest_hostname: String,
    pub stream_key: String,
    /// Pacing limit in kbit/s, 0 for unlimited.
    pub peak_kbps: u32,
    pub sync: bool,
    /// Connect when the session is activated instead of on the first send.
    pub async_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ingest_hostname: AUTO_INGEST.to_string(),
            stream_key: String::new(),
            peak_kbps: 0,
            sync: true,
            async_connect: true,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.stream_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("SessionConfig")
            .field("ingest_hostname", &self.ingest_hostname)
            .field("stream_key", &key)
            .field("peak_kbps", &self.peak_kbps)
            .field("sync", &self.sync)
            .field("async_connect", &self.async_connect)
            .finish()
    }
}

impl SessionConfigInput {
    pub fn resolve(self) -> Result<SessionConfig, SessionError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(SessionError::Config(format!(
                "Unsupported config version {}",
                version
            )));
        }

        let defaults = SessionConfig::default();
        Ok(SessionConfig {
            ingest_hostname: normalize_hostname(self.ingest_hostname.as_deref()),
            stream_key: self
                .stream_key
                .map(|key| key.trim().to_string())
                .unwrap_or_default(),
            peak_kbps: self.peak_kbps.unwrap_or(defaults.peak_kbps),
            sync: self.sync.unwrap_or(defaults.sync),
            async_connect: self.async_connect.unwrap_or(defaults.async_connect),
        })
    }
}

impl SessionConfig {
    pub fn new(stream_key: impl Into<String>) -> Self {
        Self {
            stream_key: stream_key.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, SessionError> {
        if input.trim().is_empty() {
            return Ok(SessionConfig::default());
        }
        let parsed: SessionConfigInput = toml::from_str(input)
            .map_err(|e| SessionError::Config(format!("Invalid config TOML: {}", e)))?;
        parsed.resolve()
    }

    pub fn with_ingest_hostname(mut self, hostname: &str) -> Self {
        self.ingest_hostname = normalize_hostname(Some(hostname));
        self
    }

    pub fn with_peak_kbps(mut self, peak_kbps: u32) -> Self {
        self.peak_kbps = peak_kbps;
        self
    }

    pub fn with_async_connect(mut self, async_connect: bool) -> Self {
        self.async_connect = async_connect;
        self
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Builds handle creation parameters, rejecting a missing stream key.
    pub fn ingest_params(&self) -> Result<IngestParams, SessionError> {
        if self.stream_key.trim().is_empty() {
            return Err(SessionError::MissingStreamKey);
        }
        Ok(IngestParams {
            ingest_hostname: self.ingest_hostname.clone(),
            stream_key: self.stream_key.clone(),
            video_codec: VideoCodec::H264,
            audio_codec: AudioCodec::Opus,
            peak_kbps: self.peak_kbps,
            fps_num: 0,
            fps_den: 1,
            vendor_name: env!("CARGO_PKG_NAME").to_string(),
            vendor_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

fn normalize_hostname(hostname: Option<&str>) -> String {
    match hostname.map(str::trim) {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => AUTO_INGEST.to_string(),
    }
}

/// Fields that may change while a session exists.
///
/// `peak_kbps` is read when the next handle is created; `sync` is read by
/// the media-delivery side whenever it needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub peak_kbps: u32,
    pub sync: bool,
}

impl From<&SessionConfig> for RuntimeSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            peak_kbps: config.peak_kbps,
            sync: config.sync,
        }
    }
}
