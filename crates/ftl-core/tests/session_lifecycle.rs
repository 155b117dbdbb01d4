//! # Integration tests: Session ↔ loopback ingest
//!
//! Drives a full session through its lifecycle with the in-process
//! provider: frames go in through the render path, status messages are
//! pushed into the provider queue and come back out through the observer.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use ftl_core::error::ProviderCode;
use ftl_core::loopback::LoopbackProvider;
use ftl_core::observer::ChannelObserver;
use ftl_core::status::{
    ConnectionEvent, EventReason, EventType, PacketStats, StatusMessage, VideoFrameStats,
};
use ftl_core::{
    MediaKind, Session, SessionConfig, SessionError, SessionEvent, SessionState, Transition,
};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn start(config: SessionConfig) -> (LoopbackProvider, Session, Receiver<SessionEvent>) {
    init_tracing();
    let provider = LoopbackProvider::new();
    let (observer, rx) = ChannelObserver::new();
    let session = Session::new(config, Arc::new(provider.clone()), Arc::new(observer))
        .with_poll_interval(Duration::from_millis(20));
    session.change_state(Transition::NullToReady).unwrap();
    session.change_state(Transition::ReadyToActive).unwrap();
    (provider, session, rx)
}

fn next_matching(
    rx: &Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Option<SessionEvent> {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while let Some(left) = deadline.checked_duration_since(std::time::Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

/// AUD, SPS, PPS and an IDR slice with mixed start code forms.
const KEYFRAME: &[u8] = &[
    0, 0, 0, 1, 0x09, 0xF0, //
    0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, //
    0, 0, 1, 0x68, 0xCE, 0x3C, 0x80, //
    0, 0, 1, 0x65, 0x88, 0x84, 0x00, 0x33,
];

// ─── Media Path ─────────────────────────────────────────────────────────────

#[test]
fn keyframe_is_split_without_delimiter() {
    let (provider, session, _rx) = start(SessionConfig::new("1234-abcd"));

    let report = session.render(MediaKind::Video, KEYFRAME, 33_367).unwrap();
    assert_eq!(report.units, 3);
    assert_eq!(report.bytes_sent, 4 + 4 + 5);

    let sent = provider.sent_units();
    let types: Vec<u8> = sent.iter().map(|u| u.payload[0] & 0x1F).collect();
    assert_eq!(types, vec![7, 8, 5]);
    assert!(sent.iter().all(|u| u.kind == MediaKind::Video));
    assert!(sent.iter().all(|u| u.timestamp_us == 33_367));
    let last: Vec<bool> = sent.iter().map(|u| u.end_of_frame).collect();
    assert_eq!(last, vec![false, false, true]);
}

#[test]
fn audio_and_video_share_one_connection() {
    let (provider, session, _rx) =
        start(SessionConfig::new("k").with_async_connect(false));
    assert_eq!(provider.counters().connects, 0);

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..20u64 {
                session
                    .render(MediaKind::Audio, &[0xFC, 0xFF, 0xFE], i * 20_000)
                    .unwrap();
            }
        });
        s.spawn(|| {
            for i in 0..10u64 {
                session
                    .render(MediaKind::Video, KEYFRAME, i * 33_333)
                    .unwrap();
            }
        });
    });

    assert_eq!(provider.counters().connects, 1);
    let sent = provider.sent_units();
    assert_eq!(sent.iter().filter(|u| u.kind == MediaKind::Audio).count(), 20);
    assert_eq!(sent.iter().filter(|u| u.kind == MediaKind::Video).count(), 30);
    assert!(sent
        .iter()
        .filter(|u| u.kind == MediaKind::Audio)
        .all(|u| u.end_of_frame));
}

#[test]
fn send_failure_only_loses_the_frame() {
    let (provider, session, rx) = start(SessionConfig::new("k"));
    provider.fail_next_send(ProviderCode(21));

    let err = session.render(MediaKind::Video, KEYFRAME, 0).unwrap_err();
    assert!(matches!(err, SessionError::Send { .. }));
    assert!(session.link().unwrap().is_connected());

    session.render(MediaKind::Video, KEYFRAME, 33_333).unwrap();
    assert_eq!(provider.sent_units().len(), 3);
    assert!(rx
        .try_iter()
        .all(|e| !matches!(e, SessionEvent::Error(SessionError::Send { .. }))));
}

// ─── Status Path ────────────────────────────────────────────────────────────

#[test]
fn stats_reach_the_observer() {
    let (provider, session, rx) = start(SessionConfig::new("k"));
    provider.push_status(StatusMessage::PacketStats(PacketStats {
        period_ms: 5_000,
        sent: 1_200,
        nack_requests: 4,
        ..Default::default()
    }));
    provider.push_status(StatusMessage::VideoFrameStats(VideoFrameStats {
        frames_sent: 150,
        bytes_sent: 900_000,
        ..Default::default()
    }));

    let event = next_matching(&rx, |e| matches!(e, SessionEvent::Stats(_))).unwrap();
    let SessionEvent::Stats(summary) = event else {
        unreachable!()
    };
    assert_eq!(summary.packets_sent, Some(1_200));
    assert_eq!(summary.time_total, Some(Duration::from_secs(5)));

    drop(session);
}

#[test]
fn remote_disconnect_is_fatal() {
    let (provider, session, rx) = start(SessionConfig::new("k"));
    provider.push_status(StatusMessage::Event(ConnectionEvent {
        event_type: EventType::Disconnected,
        reason: EventReason::NoMedia,
        error_code: ProviderCode(27),
    }));

    let event = next_matching(&rx, |e| {
        matches!(e, SessionEvent::Error(SessionError::ConnectionLost { .. }))
    })
    .expect("connection loss reported");
    if let SessionEvent::Error(err) = event {
        assert!(err.to_string().contains("no media timeout"));
    }

    session.change_state(Transition::ActiveToReady).unwrap();
    session.change_state(Transition::ReadyToNull).unwrap();
    assert_eq!(session.state(), SessionState::Null);
}

#[test]
fn local_teardown_is_not_reported() {
    let (provider, session, rx) = start(SessionConfig::new("k"));
    session.change_state(Transition::ActiveToReady).unwrap();
    session.change_state(Transition::ReadyToNull).unwrap();

    assert!(rx
        .try_iter()
        .all(|e| !matches!(e, SessionEvent::Error(SessionError::ConnectionLost { .. }))));
    assert_eq!(provider.counters().destroys, 1);
}

// ─── Configuration ──────────────────────────────────────────────────────────

#[test]
fn toml_config_drives_handle_creation() {
    let config = SessionConfig::from_toml_str(
        r#"
        version = 1
        ingest-hostname = "ingest-lax.example.net"
        stream-key = "42-secret"
        peak-kbps = 6000
        async-connect = false
        "#,
    )
    .unwrap();
    let (provider, session, _rx) = start(config);

    let params = provider.last_params().unwrap();
    assert_eq!(params.ingest_hostname, "ingest-lax.example.net");
    assert_eq!(params.peak_kbps, 6000);
    assert_eq!(provider.counters().connects, 0);
    assert!(session.sync());
}

#[test]
fn restart_creates_a_fresh_handle() {
    let (provider, session, _rx) = start(SessionConfig::new("k"));
    session.change_state(Transition::ActiveToReady).unwrap();
    session.change_state(Transition::ReadyToNull).unwrap();
    session.change_state(Transition::NullToReady).unwrap();
    session.change_state(Transition::ReadyToActive).unwrap();

    let counters = provider.counters();
    assert_eq!(counters.creates, 2);
    assert_eq!(counters.destroys, 1);
    assert_eq!(counters.connects, 2);
    session.render(MediaKind::Video, KEYFRAME, 0).unwrap();
}
