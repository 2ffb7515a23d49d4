use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::app::SessionHandler;
use crate::cli::{OutputFormat, parse_duration};
use crate::controller::{SessionOptions, run_session};
use crate::hw::{DeviceSelector, HardwareClient};
use crate::terminal::TerminalClient;
use crate::watchdog::WatchdogConfig;

use super::ui::{ConsoleObserver, MonitorReadyView, Painter, SessionSummaryView};

/// Arguments for the `monitor` command.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct MonitorArgs {
    /// Stop after this many readings. Runs until Ctrl+C when omitted.
    #[arg(long)]
    max_readings: Option<u64>,
    /// Send a keep-alive refresh once no reading has arrived for this long (e.g. `10s`).
    #[arg(long, value_parser = parse_duration)]
    refresh_after: Option<Duration>,
    /// Do not cycle the power mode from the watchdog.
    #[arg(long)]
    no_demo_cadence: bool,
}

impl MonitorArgs {
    /// Creates monitor arguments directly without CLI parsing.
    #[must_use]
    pub fn new(
        max_readings: Option<u64>,
        refresh_after: Option<Duration>,
        no_demo_cadence: bool,
    ) -> Self {
        Self {
            max_readings,
            refresh_after,
            no_demo_cadence,
        }
    }

    /// Session settings derived from the flags.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        let watchdog = WatchdogConfig::builder()
            .maybe_stale_after(self.refresh_after)
            .build();
        SessionOptions::builder()
            .watchdog(watchdog)
            .maybe_max_readings(self.max_readings)
            .demo_cadence(!self.no_demo_cadence)
            .build()
    }
}

/// Executes the `monitor` command.
#[instrument(skip(client, out, terminal_client), level = "info", fields(%selector, ?output_format))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    selector: &DeviceSelector,
    args: &MonitorArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write + Send,
{
    let session = SessionHandler::new(client)
        .with_selector(selector.clone())
        .connect_first()
        .await?;
    let painter = Painter::new(terminal_client.stdout_is_terminal());
    if output_format == OutputFormat::Pretty {
        writeln!(out, "{}", MonitorReadyView::new(session.device(), &painter))?;
    }

    let options = args.session_options();
    let mut observer = ConsoleObserver::new(out, &painter, output_format);
    let outcome = run_session(&session, &options, &mut observer).await;
    let write_error = observer.into_write_error();
    let closed = session.close().await;

    let summary = outcome?;
    if let Some(error) = write_error {
        return Err(error.into());
    }
    closed?;

    if output_format == OutputFormat::Pretty {
        writeln!(out)?;
        writeln!(out, "{}", SessionSummaryView::new(&summary, &painter))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_keep_device_timing() {
        let options = MonitorArgs::default().session_options();
        assert_eq!(WatchdogConfig::default(), options.watchdog());
        assert_eq!(None, options.max_readings());
        assert_eq!(true, options.demo_cadence());
    }

    #[test]
    fn refresh_after_only_changes_the_stale_threshold() {
        let options = MonitorArgs::new(Some(3), Some(Duration::from_secs(4)), true).session_options();
        let watchdog = options.watchdog();
        assert_eq!(Duration::from_secs(4), watchdog.stale_after());
        assert_eq!(WatchdogConfig::default().tick(), watchdog.tick());
        assert_eq!(Some(3), options.max_readings());
        assert_eq!(false, options.demo_cadence());
    }
}
