use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use phoenix::{
    DemoCadence, DeviceSession, EndpointId, FakeArgs, LivenessClock, NoCommands, Watchdog,
    WatchdogConfig, WriteLog,
};

const SCAN: &str = "hci0|DE:33:11:25:72:13|VE.Direct Smart|-43";
const REFRESH: [u8; 2] = [0xF9, 0x41];

async fn connect(write_log: &WriteLog) -> anyhow::Result<DeviceSession> {
    let fake_args = FakeArgs::builder()
        .scan_fixture(SCAN)?
        .write_log(write_log.clone())
        .build();
    phoenix::SessionHandler::new(phoenix::fake_hardware_client(fake_args))
        .connect_first()
        .await
}

fn seconds_since(start: Instant, at: Instant) -> f64 {
    at.duration_since(start).as_secs_f64()
}

#[tokio::test(start_paused = true)]
async fn stale_link_is_refreshed_once_per_tick() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(&write_log).await?;
    let start = Instant::now();
    let config = WatchdogConfig::default();
    let clock = LivenessClock::new(config.startup_grace());
    let cancel = CancellationToken::new();

    let watchdog = Watchdog::new(config, &clock, Box::new(NoCommands));
    let stop = async {
        sleep(Duration::from_millis(25_500)).await;
        cancel.cancel();
    };
    let (summary, ()) = tokio::join!(watchdog.run(&session, cancel.clone()), stop);

    assert_eq!(25, summary.ticks());
    assert_eq!(5, summary.stale_refreshes());
    let times: Vec<f64> = write_log
        .entries()
        .iter()
        .inspect(|write| assert_eq!(REFRESH.as_slice(), write.payload()))
        .map(|write| seconds_since(start, write.at()))
        .collect();
    assert_eq!(vec![21.0, 22.0, 23.0, 24.0, 25.0], times);

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn a_new_reading_stops_the_refreshes() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(&write_log).await?;
    let config = WatchdogConfig::default();
    let clock = LivenessClock::new(config.startup_grace());
    let cancel = CancellationToken::new();

    let watchdog = Watchdog::new(config, &clock, Box::new(NoCommands));
    let drive = async {
        sleep(Duration::from_millis(22_500)).await;
        clock.touch();
        sleep(Duration::from_secs(8)).await;
        cancel.cancel();
    };
    let (summary, ()) = tokio::join!(watchdog.run(&session, cancel.clone()), drive);

    assert_eq!(2, summary.stale_refreshes());
    assert_eq!(2, write_log.entries().len());

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn demo_cadence_cycles_power_with_trailing_refreshes() -> anyhow::Result<()> {
    let write_log = WriteLog::default();
    let session = connect(&write_log).await?;
    let start = Instant::now();
    let config = WatchdogConfig::builder()
        .stale_after(Duration::from_secs(3_600))
        .build();
    let clock = LivenessClock::new(config.startup_grace());
    let cancel = CancellationToken::new();

    let watchdog = Watchdog::new(config, &clock, Box::new(DemoCadence));
    let stop = async {
        sleep(Duration::from_millis(72_500)).await;
        cancel.cancel();
    };
    let (summary, ()) = tokio::join!(watchdog.run(&session, cancel.clone()), stop);

    assert_eq!(3, summary.commands());
    assert_eq!(3, summary.trailing_refreshes());
    assert_eq!(0, summary.stale_refreshes());
    let writes: Vec<_> = write_log
        .entries()
        .iter()
        .map(|write| {
            (
                seconds_since(start, write.at()),
                write.endpoint(),
                hex::encode(write.payload()),
            )
        })
        .collect();
    assert_eq!(
        vec![
            (21.0, Some(EndpointId::Secondary), "0603821902004105".to_string()),
            (22.0, Some(EndpointId::Control), "f941".to_string()),
            (51.0, Some(EndpointId::Secondary), "0603821902004102".to_string()),
            (52.0, Some(EndpointId::Control), "f941".to_string()),
            (71.0, Some(EndpointId::Secondary), "0603821902004104".to_string()),
            (72.0, Some(EndpointId::Control), "f941".to_string()),
        ],
        writes
    );

    session.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_writes_are_counted_and_skipped() -> anyhow::Result<()> {
    let fake_args = FakeArgs::builder()
        .scan_fixture(SCAN)?
        .failing_writes(vec![EndpointId::Control])
        .build();
    let session = phoenix::SessionHandler::new(phoenix::fake_hardware_client(fake_args))
        .connect_first()
        .await?;
    let config = WatchdogConfig::default();
    let clock = LivenessClock::new(config.startup_grace());
    let cancel = CancellationToken::new();

    let watchdog = Watchdog::new(config, &clock, Box::new(NoCommands));
    let stop = async {
        sleep(Duration::from_millis(23_500)).await;
        cancel.cancel();
    };
    let (summary, ()) = tokio::join!(watchdog.run(&session, cancel.clone()), stop);

    assert_eq!(3, summary.stale_refreshes());
    assert_eq!(3, summary.failed_writes());

    session.close().await?;
    Ok(())
}
