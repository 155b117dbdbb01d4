//! Per-pass aggregation of the ingest library's counters.

use serde::Serialize;
use std::time::Duration;

use crate::status::{InstantPacketStats, PacketStats, VideoFrameStats};

/// Counters drained during one status poll pass.
///
/// Each kind of stats message fills its own group of fields; a later message
/// of the same kind within the pass overwrites the earlier one. Nothing is
/// carried over between passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatsSummary {
    #[serde(skip_serializing_if = "Option::is_none", with = "duration_ns")]
    pub time_total: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_sent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nacks_received: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none", with = "duration_ns")]
    pub time_interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_avg: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmit_delay_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmit_delay_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmit_delay_avg: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_frames_queued: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_frames_sent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bytes_queued: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bytes_sent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_queue_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_max_frame_size: Option<i32>,
}

fn period(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

impl StatsSummary {
    pub fn fold_packets(&mut self, stats: &PacketStats) {
        self.time_total = Some(period(stats.period_ms));
        self.packets_sent = Some(stats.sent);
        self.nacks_received = Some(stats.nack_requests);
    }

    pub fn fold_instant(&mut self, stats: &InstantPacketStats) {
        self.time_interval = Some(period(stats.period_ms));
        self.rtt_min = Some(stats.min_rtt);
        self.rtt_max = Some(stats.max_rtt);
        self.rtt_avg = Some(stats.avg_rtt);
        self.xmit_delay_min = Some(stats.min_xmit_delay);
        self.xmit_delay_max = Some(stats.max_xmit_delay);
        self.xmit_delay_avg = Some(stats.avg_xmit_delay);
    }

    pub fn fold_video(&mut self, stats: &VideoFrameStats) {
        self.video_frames_queued = Some(stats.frames_queued);
        self.video_frames_sent = Some(stats.frames_sent);
        self.video_bytes_queued = Some(stats.bytes_queued);
        self.video_bytes_sent = Some(stats.bytes_sent);
        self.video_queue_level = Some(stats.queue_fullness);
        self.video_max_frame_size = Some(stats.max_frame_size);
    }
}

mod duration_ns {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_nanos() as u64),
            None => s.serialize_none(),
        }
    }
}
