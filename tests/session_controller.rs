use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use phoenix::{
    DeviceSession, EndpointId, FakeArgs, InboundNotification, InteractionError, LiveStopReason,
    LivenessClock, PowerState, PowerSwitchState, Reading, SessionController, SessionOptions,
    SessionPhase, WatchdogConfig, WriteLog,
};

const SCAN: &str = "hci1|00:11:22|Speaker|-65;hci0|DE:33:11:25:72:13|VE.Direct Smart|-43";

async fn connect(fake_args: FakeArgs) -> anyhow::Result<DeviceSession> {
    phoenix::SessionHandler::new(phoenix::fake_hardware_client(fake_args))
        .connect_first()
        .await
}

fn assert_volts(expected: f64, reading: &Reading) {
    assert_matches!(
        reading,
        Reading::OutputVoltage { volts } if (volts - expected).abs() < 1e-9,
        "expected {expected} V, got {reading:?}"
    );
}

#[tokio::test]
async fn handshake_writes_go_out_in_order() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .write_log(write_log.clone())
            .build(),
    )
    .await?;
    let clock = LivenessClock::new(Duration::from_secs(10));

    let mut controller = SessionController::discover(&session, &clock).await?;
    assert_eq!(SessionPhase::Initializing, controller.phase());
    let report = controller.initialize().await;
    assert_eq!(SessionPhase::Live, controller.phase());
    assert_eq!(7, report.written().len());
    assert!(report.dropped().is_empty());

    let writes: Vec<_> = write_log
        .entries()
        .iter()
        .map(|write| (write.endpoint(), hex::encode(write.payload())))
        .collect();
    assert_eq!(
        vec![
            (Some(EndpointId::Control), "fa80ff".to_string()),
            (Some(EndpointId::Control), "f980".to_string()),
            (Some(EndpointId::Control), "01".to_string()),
            (Some(EndpointId::Secondary), "01".to_string()),
            (Some(EndpointId::Secondary), "0300".to_string()),
            (
                Some(EndpointId::Secondary),
                "060082189342102703010303".to_string()
            ),
            (Some(EndpointId::Control), "f941".to_string()),
        ],
        writes
    );

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn marker_burst_decodes_output_voltage() -> anyhow::Result<()> {
    let session = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let clock = LivenessClock::new(Duration::from_secs(10));
    let mut controller = SessionController::discover(&session, &clock).await?;
    let bulk_uuid = controller
        .discovery()
        .channels()
        .uuid_for(EndpointId::Bulk)
        .map(str::to_string)
        .expect("bulk channel resolved");

    let burst = [
        0x08, 0x03, 0x08, 0x03, 0x00, 0x00, 0x00, 0x00, // opens the burst
        0x08, 0x03, 0x19, 0x22, 0x00, 0x42, 0xE8, 0x03, // type 34, raw 1000
        0x08, 0x03, 0x19, 0x22, 0x00, 0x42, 0xE8, 0x03,
    ];
    let mut readings: Vec<Reading> = Vec::new();
    let published = controller.handle_notification(
        &InboundNotification::new(bulk_uuid, burst.to_vec()),
        &mut readings,
    );

    assert_eq!(3, published);
    assert_matches!(readings[0], Reading::Unrecognized { type_code: 3, .. });
    assert_volts(10.0, &readings[1]);
    assert_volts(10.0, &readings[2]);

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn short_frames_on_control_decode_directly() -> anyhow::Result<()> {
    let session = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let clock = LivenessClock::new(Duration::from_secs(10));
    let mut controller = SessionController::discover(&session, &clock).await?;
    let channels = controller.discovery().channels().clone();
    let control = channels.uuid_for(EndpointId::Control).expect("control resolved");
    let secondary = channels
        .uuid_for(EndpointId::Secondary)
        .expect("secondary resolved");

    let mut readings: Vec<Reading> = Vec::new();
    controller.handle_notification(
        &InboundNotification::new(control, vec![0x08, 0x03, 0x19, 0x02, 0x00, 0x41, 0x02]),
        &mut readings,
    );
    let ignored = controller.handle_notification(
        &InboundNotification::new(secondary, vec![0x08, 0x03, 0x19, 0x02, 0x00, 0x41, 0x04]),
        &mut readings,
    );

    assert_eq!(0, ignored);
    assert_eq!(
        vec![Reading::PowerSwitchEcho {
            state: PowerSwitchState::On
        }],
        readings
    );

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn undecodable_control_frames_are_counted_not_published() -> anyhow::Result<()> {
    let session = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let clock = LivenessClock::new(Duration::from_secs(10));
    let mut controller = SessionController::discover(&session, &clock).await?;
    let control = controller
        .discovery()
        .channels()
        .uuid_for(EndpointId::Control)
        .map(str::to_string)
        .expect("control resolved");

    let mut readings: Vec<Reading> = Vec::new();
    let published = controller
        .handle_notification(&InboundNotification::new(control, vec![0x08, 0x03, 0x19]), &mut readings);

    assert_eq!(0, published);
    assert!(readings.is_empty());

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn missing_channels_stop_discovery() -> anyhow::Result<()> {
    let session = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .missing_endpoints(vec![EndpointId::Secondary, EndpointId::Bulk])
            .build(),
    )
    .await?;
    let clock = LivenessClock::new(Duration::from_secs(10));

    let result = SessionController::discover(&session, &clock).await;

    assert_matches!(
        result,
        Err(InteractionError::MissingRequiredEndpoints { ref missing })
            if missing.contains("secondary") && missing.contains("bulk")
    );
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn controller_reports_discovering_until_channels_resolve() -> anyhow::Result<()> {
    let complete = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let incomplete = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .missing_endpoints(vec![EndpointId::Bulk])
            .build(),
    )
    .await?;
    let clock = LivenessClock::new(Duration::from_secs(10));

    let mut stuck = SessionController::new(&incomplete, &clock);
    assert_eq!(SessionPhase::Discovering, stuck.phase());
    assert!(stuck.discover_channels().await.is_err());
    assert_eq!(SessionPhase::Discovering, stuck.phase());

    let mut controller = SessionController::new(&complete, &clock);
    assert_eq!(SessionPhase::Discovering, controller.phase());
    let subscribed = controller.discover_channels().await?.subscribed().len();
    assert_eq!(3, subscribed);
    assert_eq!(SessionPhase::Initializing, controller.phase());

    complete.close().await?;
    incomplete.close().await?;
    Ok(())
}

#[tokio::test]
async fn refused_subscriptions_are_skipped() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .failing_subscriptions(vec![EndpointId::Secondary])
            .write_log(write_log.clone())
            .build(),
    )
    .await?;
    let clock = LivenessClock::new(Duration::from_secs(10));

    let mut controller = SessionController::discover(&session, &clock).await?;
    assert_eq!(1, controller.discovery().failed().len());
    assert_eq!(2, controller.discovery().subscribed().len());

    controller.initialize().await;
    assert_eq!(7, write_log.entries().len());

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn failed_handshake_writes_are_dropped() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .failing_writes(vec![EndpointId::Secondary])
            .write_log(write_log.clone())
            .build(),
    )
    .await?;
    let clock = LivenessClock::new(Duration::from_secs(10));
    let mut controller = SessionController::discover(&session, &clock).await?;

    let report = controller.initialize().await;

    assert_eq!(4, report.written().len());
    assert_eq!(3, report.dropped().len());
    assert_eq!(SessionPhase::Live, controller.phase());
    assert!(
        write_log
            .entries()
            .iter()
            .all(|write| write.endpoint() == Some(EndpointId::Control))
    );

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn default_fixture_streams_readings_until_the_limit() -> anyhow::Result<()> {
    let session = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let options = SessionOptions::builder().max_readings(6).build();

    let mut readings: Vec<Reading> = Vec::new();
    let summary = phoenix::run_session(&session, &options, &mut readings).await?;

    assert_eq!(LiveStopReason::ReachedLimit(6), summary.live().stop_reason());
    assert_eq!(6, readings.len());
    for (reading, volts) in readings.iter().zip([230.01, 230.02, 230.07, 230.02, 230.01]) {
        assert_volts(volts, reading);
    }
    assert_eq!(
        Reading::PowerSwitchEcho {
            state: PowerSwitchState::Eco
        },
        readings[5]
    );
    assert_eq!(3, summary.live().notifications());
    assert_eq!(0, summary.live().anomalies());

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn limit_stops_publishing_inside_a_bulk_burst() -> anyhow::Result<()> {
    let session = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let options = SessionOptions::builder().max_readings(2).build();

    let mut readings: Vec<Reading> = Vec::new();
    let summary = phoenix::run_session(&session, &options, &mut readings).await?;

    assert_eq!(LiveStopReason::ReachedLimit(2), summary.live().stop_reason());
    assert_eq!(2, summary.live().readings());
    assert_eq!(2, readings.len());
    assert_volts(230.01, &readings[0]);
    assert_volts(230.02, &readings[1]);

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_limit_stops_before_any_notification() -> anyhow::Result<()> {
    let session = connect(FakeArgs::builder().scan_fixture(SCAN)?.build()).await?;
    let options = SessionOptions::builder().max_readings(0).build();

    let mut readings: Vec<Reading> = Vec::new();
    let summary = phoenix::run_session(&session, &options, &mut readings).await?;

    assert_eq!(LiveStopReason::ReachedLimit(0), summary.live().stop_reason());
    assert_eq!(0, summary.live().notifications());
    assert!(readings.is_empty());

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_link_gets_keepalive_refreshes() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .notifications("control:08031901014109")?
            .notification_interval(Duration::from_millis(25_500))
            .close_after_notifications(true)
            .write_log(write_log.clone())
            .build(),
    )
    .await?;
    let options = SessionOptions::builder()
        .watchdog(WatchdogConfig::default())
        .demo_cadence(false)
        .build();

    let mut readings: Vec<Reading> = Vec::new();
    let summary = phoenix::run_session(&session, &options, &mut readings).await?;

    assert_eq!(LiveStopReason::StreamClosed, summary.live().stop_reason());
    assert_eq!(5, summary.watchdog().stale_refreshes());
    assert_eq!(0, summary.watchdog().commands());
    let refreshes = write_log
        .entries()
        .iter()
        .filter(|write| write.payload() == [0xF9, 0x41])
        .count();
    assert_eq!(1 + 5, refreshes);
    assert_eq!(
        vec![Reading::PowerStateReport {
            state: PowerState::On
        }],
        readings
    );

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn writes_to_absent_channels_fail_fast() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(
        FakeArgs::builder()
            .scan_fixture(SCAN)?
            .missing_endpoints(vec![EndpointId::Secondary])
            .write_log(write_log.clone())
            .build(),
    )
    .await?;

    let result = phoenix::PowerHandler::set_power(&session, PowerSwitchState::On).await;

    assert_matches!(
        result,
        Err(phoenix::ProtocolError::Interaction(ref error))
            if matches!(**error, InteractionError::MissingEndpoint { endpoint: EndpointId::Secondary })
    );
    assert!(write_log.entries().is_empty());

    session.close().await?;
    Ok(())
}
