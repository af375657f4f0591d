//! Transport lifecycle and scheduler pacing through the public handle.

mod common;

use common::*;
use orion_meter::adapters::MockAdapter;
use orion_meter::{ConnectionState, MeterError, MeterHandle, MeterPayload, Settings};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_open_failure_reports_and_stays_closed() {
    let (meter, _task) = MeterHandle::spawn(&Settings::default(), MockAdapter::refusing());
    let mut events = meter.subscribe();

    let err = meter.open().await.unwrap_err();
    assert!(matches!(err, MeterError::Serial(_)));

    let first = events.recv().await.unwrap().payload;
    assert!(matches!(first, MeterPayload::Error(msg) if msg.starts_with("Port Error")));
    assert_eq!(
        events.recv().await.unwrap().payload,
        MeterPayload::State(ConnectionState::Closed)
    );
    assert_eq!(
        meter.snapshot().await.unwrap().state,
        ConnectionState::Closed
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_tears_down_link() {
    let mut bench = start().await;
    bench.meter.close().await.unwrap();

    assert_eq!(
        states(&bench.drain()),
        vec![
            ConnectionState::Offline,
            ConnectionState::Closing,
            ConnectionState::Closed
        ]
    );
    // commands already in flight may still be buffered ahead of EOF
    let eof = tokio::time::timeout(PATIENCE, async {
        while bench.device.next_command().await.is_ok() {}
    })
    .await;
    assert!(eof.is_ok(), "link stayed open after close");

    // polls stay quiet while closed
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(bench
        .drain()
        .iter()
        .all(|p| !matches!(p, MeterPayload::Tx(_))));
}

#[tokio::test(start_paused = true)]
async fn test_peer_disconnect_forces_closed() {
    let bench = start().await;
    let common::Bench {
        meter,
        mut events,
        device,
        ..
    } = bench;
    drop(device);

    loop {
        let event = events.recv().await.unwrap();
        if event.payload == MeterPayload::State(ConnectionState::Closed) {
            break;
        }
    }
    assert_eq!(
        meter.snapshot().await.unwrap().state,
        ConnectionState::Closed
    );
}

#[tokio::test(start_paused = true)]
async fn test_send_named_and_raw_commands() {
    let mut bench = start().await;
    bench.meter.send("GETMENU 0000,45,1").await.unwrap();
    bench.meter.send("Blip").await.unwrap();

    bench.skip_until("GETMENU 0000,45,1").await;
    let skipped = bench.skip_until("KEY WW").await;
    // only alive-poll traffic may sit between them
    assert!(skipped
        .iter()
        .all(|c| c == "KEY X" || c == "GETCAL ORP"));

    let tx: Vec<_> = bench
        .drain()
        .into_iter()
        .filter_map(|p| match p {
            MeterPayload::Tx(text) => Some(text),
            _ => None,
        })
        .collect();
    assert!(tx.contains(&"GETMENU 0000,45,1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_transmissions_never_overlap() {
    let mut bench = start().await;
    bench.bring_online().await;

    // drop offline, probe, recover, drop again: many transitions
    let mut last: Option<Instant> = None;
    let mut answered_probe = false;
    for _ in 0..40 {
        let command = bench.next_command().await;
        let now = Instant::now();
        if let Some(previous) = last {
            assert!(
                now - previous >= Duration::from_millis(500),
                "'{}' sent {:?} after the previous command",
                command,
                now - previous
            );
        }
        last = Some(now);

        if command == "GETCAL ORP" && !answered_probe {
            bench.device.send_line(ORP).await.unwrap();
            answered_probe = true;
        }
    }

    let snapshot = bench.meter.snapshot().await.unwrap();
    assert!(matches!(
        snapshot.state,
        ConnectionState::Offline | ConnectionState::Online
    ));
}

#[tokio::test(start_paused = true)]
async fn test_device_error_is_recorded() {
    let mut bench = start().await;
    bench.bring_online().await;

    assert_eq!(bench.next_command().await, "GETMEAS");
    bench.device.send_line("E-3A01").await.unwrap();
    let error = bench
        .wait_for(|p| matches!(p, MeterPayload::Error(_)))
        .await;
    assert!(matches!(error, MeterPayload::Error(msg) if msg.contains("E-3A01")));

    let snapshot = bench.meter.snapshot().await.unwrap();
    let last_error = snapshot.last_error.unwrap();
    assert_eq!(last_error.error, "E-3A01");
    assert_eq!(last_error.last_command, orion_meter::CommandKind::GetData);
    // the error token answered the request, so the link stays up
    assert_eq!(snapshot.state, ConnectionState::Online);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_actor() {
    let bench = start().await;
    bench.meter.shutdown().await.unwrap();
    bench.task.await.unwrap();

    let err = bench.meter.snapshot().await.unwrap_err();
    assert!(matches!(err, MeterError::ActorStopped));
}

#[tokio::test(start_paused = true)]
async fn test_power_on_banner_reinitializes() {
    let mut bench = start().await;
    bench.bring_online().await;

    bench
        .device
        .send_line("Thermo Scientific (c) 2007")
        .await
        .unwrap();
    assert_eq!(bench.next_command().await, "GETMEAS");
    // meter rebooted and lost our settings: the poll goes unanswered
    bench.wait_for_state(ConnectionState::Offline).await;
    bench.skip_until("GETCAL ORP").await;
    bench.device.send_line(ORP).await.unwrap();
    bench.wait_for_state(ConnectionState::Initializing).await;
}

#[tokio::test(start_paused = true)]
async fn test_settings_drive_poll_period() {
    let settings = Settings {
        meas_poll_ms: 2_000,
        ..Settings::default()
    };
    let mut bench = start_with(settings).await;
    bench.bring_online().await;

    let first = {
        assert_eq!(bench.next_command().await, "GETMEAS");
        Instant::now()
    };
    bench.device.send_line(MEASUREMENT).await.unwrap();
    assert_eq!(bench.next_command().await, "GETMEAS");
    assert!(Instant::now() - first <= Duration::from_millis(2_500));
}
