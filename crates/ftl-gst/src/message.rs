//! Bus messages posted on behalf of a session.

use ftl_core::{ErrorKind, SessionError, SessionObserver, StatsSummary};
use gst::glib;
use gst::prelude::*;
use std::time::Duration;

/// Name of the element message carrying a [`StatsSummary`].
pub const STATS_STRUCTURE: &str = "ftl-stats";

fn clock_time_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Builds the `ftl-stats` structure. Only the groups present in the
/// summary become fields; durations are clock times in nanoseconds.
pub fn stats_structure(summary: &StatsSummary) -> gst::Structure {
    let mut s = gst::Structure::builder(STATS_STRUCTURE);

    if let Some(t) = summary.time_total {
        s = s.field("time-total", clock_time_ns(t));
    }
    if let Some(v) = summary.packets_sent {
        s = s.field("packets-sent", v);
    }
    if let Some(v) = summary.nacks_received {
        s = s.field("nacks-received", v);
    }

    if let Some(t) = summary.time_interval {
        s = s.field("time-interval", clock_time_ns(t));
    }
    let delays = [
        ("rtt-min", summary.rtt_min),
        ("rtt-max", summary.rtt_max),
        ("rtt-avg", summary.rtt_avg),
        ("xmit-delay-min", summary.xmit_delay_min),
        ("xmit-delay-max", summary.xmit_delay_max),
        ("xmit-delay-avg", summary.xmit_delay_avg),
    ];
    for (name, value) in delays {
        if let Some(v) = value {
            s = s.field(name, v);
        }
    }

    let video_counts = [
        ("video-frames-queued", summary.video_frames_queued),
        ("video-frames-sent", summary.video_frames_sent),
        ("video-bytes-queued", summary.video_bytes_queued),
        ("video-bytes-sent", summary.video_bytes_sent),
    ];
    for (name, value) in video_counts {
        if let Some(v) = value {
            s = s.field(name, v);
        }
    }
    if let Some(v) = summary.video_queue_level {
        s = s.field("video-queue-level", v);
    }
    if let Some(v) = summary.video_max_frame_size {
        s = s.field("video-max-frame-size", v);
    }

    s.build()
}

fn build_error<T: gst::MessageErrorDomain>(
    domain: T,
    err: &SessionError,
    details: Option<gst::Structure>,
    src: &gst::Element,
) -> gst::Message {
    let text = err.to_string();
    let debug = format!("{:?}", err);
    let builder = gst::message::Error::builder(domain, &text)
        .debug(&debug)
        .src(src);
    match details {
        Some(details) => builder.details(details).build(),
        None => builder.build(),
    }
}

/// Builds the bus error for a reported session error.
///
/// A lost connection becomes `RESOURCE/FAILED` with `reason` and
/// `error-code` details.
pub fn error_message(err: &SessionError, src: &gst::Element) -> gst::Message {
    match err {
        SessionError::ConnectionLost { reason, code, .. } => {
            let details = gst::Structure::builder("ftl-connection-lost")
                .field("reason", reason.as_raw())
                .field("error-code", code.0)
                .build();
            build_error(gst::ResourceError::Failed, err, Some(details), src)
        }
        _ => match err.kind() {
            ErrorKind::Config => build_error(gst::ResourceError::Settings, err, None, src),
            ErrorKind::Connect => build_error(gst::ResourceError::OpenWrite, err, None, src),
            ErrorKind::Send => build_error(gst::ResourceError::Write, err, None, src),
            ErrorKind::Decode => build_error(gst::StreamError::Decode, err, None, src),
            ErrorKind::Teardown => build_error(gst::ResourceError::Close, err, None, src),
            ErrorKind::ProtocolFatal => build_error(gst::ResourceError::Failed, err, None, src),
            ErrorKind::Lifecycle => build_error(gst::CoreError::StateChange, err, None, src),
        },
    }
}

/// Posts session notifications on an element's bus.
///
/// Holds the element weakly; notifications after the element is gone are
/// dropped.
#[derive(Debug, Clone)]
pub struct ElementObserver {
    element: glib::WeakRef<gst::Element>,
}

impl ElementObserver {
    pub fn new(element: &impl IsA<gst::Element>) -> Self {
        Self {
            element: element.upcast_ref::<gst::Element>().downgrade(),
        }
    }

    fn post(&self, build: impl FnOnce(&gst::Element) -> gst::Message) {
        let Some(element) = self.element.upgrade() else {
            return;
        };
        if element.post_message(build(&element)).is_err() {
            gst::debug!(gst::CAT_DEFAULT, "no bus to post session message on");
        }
    }
}

impl SessionObserver for ElementObserver {
    fn stats(&self, summary: &StatsSummary) {
        self.post(|element| {
            gst::message::Element::builder(stats_structure(summary))
                .src(element)
                .build()
        });
    }

    fn error(&self, err: &SessionError) {
        gst::error!(gst::CAT_DEFAULT, "{}", err);
        self.post(|element| error_message(err, element));
    }
}
