//! # FTL Session Core
//!
//! Streams an encoded H.264 + Opus pair to an FTL ingest through an opaque
//! provider library.
//!
//! ## Architecture
//!
//! ```text
//!   video frame ──▶ nal::scan ──▶ demux::FrameDemuxer ─┐
//!   audio frame ──────────────▶ demux::AudioRenderer ──┼──▶ link::SessionLink ──▶ IngestHandle
//!                                                      │            ▲
//!   session::Session (Null ⇄ Ready ⇄ Active) ──────────┘            │
//!        └── monitor::StatusMonitor ── poll_status ─────────────────┘
//!                  └──▶ observer::SessionObserver (stats, errors)
//! ```
//!
//! ## Modules
//!
//! - [`nal`] — Annex B start code scanning
//! - [`demux`] — per-frame validation and unit forwarding
//! - [`link`] — ingest handle ownership and the connect gate
//! - [`monitor`] — background status loop and stats aggregation
//! - [`session`] — lifecycle state machine
//! - [`provider`] — the seam to the ingest library
//! - [`loopback`] — in-process provider for tests and offline pipelines

pub mod config;
pub mod demux;
pub mod error;
pub mod link;
pub mod loopback;
pub mod monitor;
pub mod nal;
pub mod observer;
pub mod provider;
pub mod session;
pub mod stats;
pub mod status;
mod util;

pub use config::SessionConfig;
pub use error::{ErrorKind, ProviderCode, SessionError};
pub use observer::{SessionEvent, SessionObserver};
pub use provider::{IngestHandle, IngestProvider, MediaKind};
pub use session::{Session, SessionState, Transition};
pub use stats::StatsSummary;
