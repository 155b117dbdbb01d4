//! GStreamer glue for the FTL session core.
//!
//! - [`sink`] — render and state change entry points for an FTL sink element
//! - [`timestamp`] — DTS/PTS selection and running time conversion
//! - [`message`] — `ftl-stats` element messages and bus errors

pub mod message;
pub mod sink;
pub mod timestamp;

pub use message::{ElementObserver, STATS_STRUCTURE};
pub use sink::FtlSink;
