use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::cli::{DEFAULT_NAME_PREFIX, parse_duration};
use crate::cli::monitor::MonitorArgs;
use crate::cli::power::PowerArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{DeviceSelector, FakeBackendConfig, NotificationScript, ScanFixture, WriteLog};
use crate::protocol::EndpointId;

/// Command-line options for the Phoenix inverter BLE tool.
#[derive(Debug, Parser)]
#[command(name = "phoenix", about = "Monitor and control Victron Phoenix inverters over BLE.")]
pub struct Args {
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format. Defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    /// Connect to the first device whose advertised name starts with this prefix.
    #[arg(long, global = true, default_value = DEFAULT_NAME_PREFIX)]
    name_prefix: String,
    /// Connect to the device with this identifier instead of matching by name.
    #[arg(long, global = true)]
    address: Option<String>,
    /// Uses the fake BLE backend with fixture-driven discovery and notifications.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `adapter|device_id|local_name|rssi;...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Fake notifications as `channel:hex,...` where channel is `bulk`, `secondary`,
    /// `control` or a characteristic UUID.
    #[arg(long, global = true, requires = "fake")]
    fake_notifications: Option<NotificationScript>,
    /// Artificial fake scan delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use phoenix::{Args, Command};
    ///
    /// let inspect = Args::new(Command::Inspect);
    /// let _ = inspect;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            format: None,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            address: None,
            fake: false,
            fake_scan: None,
            fake_notifications: None,
            fake_discovery_delay: None,
            command,
        }
    }

    /// Returns the explicit log level, if any.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Returns the explicit output format, if any.
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.format
    }

    /// Device selection derived from `--address` and `--name-prefix`.
    #[must_use]
    pub fn device_selector(&self) -> DeviceSelector {
        match &self.address {
            Some(address) => DeviceSelector::Address(address.clone()),
            None => DeviceSelector::NamePrefix(self.name_prefix.clone()),
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        self.fake = true;
        self.fake_scan = Some(fake.scan_fixture);
        self.fake_notifications = fake.notifications;
        self.fake_discovery_delay = Some(fake.discovery_delay);
        self
    }

    /// Splits parsed CLI arguments into command and optional fake-client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_notifications,
            fake_discovery_delay,
            command,
            ..
        } = self;

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan_fixture,
                notifications: fake_notifications,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
                notification_interval: Duration::ZERO,
                close_after_notifications: false,
                missing_endpoints: Vec::new(),
                failing_subscriptions: Vec::new(),
                failing_writes: Vec::new(),
                write_log: WriteLog::default(),
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    notifications: Option<NotificationScript>,
    /// Artificial delay before the fake device is found.
    #[builder(default)]
    discovery_delay: Duration,
    /// Pause before each scripted notification.
    #[builder(default)]
    notification_interval: Duration,
    /// End the notification stream after the script instead of waiting for cancellation.
    #[builder(default)]
    close_after_notifications: bool,
    /// Channels left out of the fake GATT table.
    #[builder(default)]
    missing_endpoints: Vec<EndpointId>,
    /// Channels whose subscription is refused.
    #[builder(default)]
    failing_subscriptions: Vec<EndpointId>,
    /// Channels whose writes fail.
    #[builder(default)]
    failing_writes: Vec<EndpointId>,
    /// Shared record of every write the fake device receives.
    #[builder(default)]
    write_log: WriteLog,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeBackendConfig {
        let Self {
            scan_fixture,
            notifications,
            discovery_delay,
            notification_interval,
            close_after_notifications,
            missing_endpoints,
            failing_subscriptions,
            failing_writes,
            write_log,
        } = self;

        FakeBackendConfig::builder()
            .scan_fixture(scan_fixture)
            .maybe_notifications(notifications)
            .discovery_delay(discovery_delay)
            .notification_interval(notification_interval)
            .close_after_notifications(close_after_notifications)
            .missing_endpoints(missing_endpoints)
            .failing_subscriptions(failing_subscriptions)
            .failing_writes(failing_writes)
            .write_log(write_log)
            .build()
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// How command output is rendered on stdout.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Coloured, human-readable lines and tables.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect, run the handshake, then print readings while keeping the link alive.
    Monitor(MonitorArgs),
    /// Connect, run the handshake, then switch the inverter power mode once.
    Power(PowerArgs),
    /// Connect and print the GATT table and which Phoenix channels were found.
    Inspect,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cli::power::PowerMode;

    const SCAN: &str = "hci0|AA:BB:CC|VE.Direct Smart|-43";

    #[test]
    fn fake_mode_requires_scan_fixture() {
        let result = Args::try_parse_from(["phoenix", "--fake", "inspect"]);

        let error = result.expect_err("missing --fake-scan should fail argument parsing");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn fake_notifications_require_fake_mode() {
        let result = Args::try_parse_from(["phoenix", "--fake-notifications", "bulk:0803", "inspect"]);

        let error = result.expect_err("fake notification flags should require --fake");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn invalid_notification_fixtures_are_rejected_at_parse_time() {
        let result = Args::try_parse_from([
            "phoenix",
            "--fake",
            "--fake-scan",
            SCAN,
            "--fake-notifications",
            "sideways:0803",
            "inspect",
        ]);

        let error = result.expect_err("unknown channel should be rejected");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }

    #[test]
    fn fake_mode_builds_fake_settings() {
        let cli = Args::try_parse_from(["phoenix", "--fake", "--fake-scan", SCAN, "inspect"])
            .expect("valid fake arguments should parse");

        let (command, fake_args) = cli
            .into_command_and_fake_args()
            .expect("valid fake arguments should resolve fake settings");
        assert_matches!(command, Command::Inspect);
        assert_matches!(fake_args, Some(_));
    }

    #[test]
    fn address_overrides_name_prefix() {
        let cli = Args::try_parse_from(["phoenix", "--address", "DE:33:11:25:72:13", "inspect"])
            .expect("address should parse");
        assert_eq!(
            DeviceSelector::Address("DE:33:11:25:72:13".to_string()),
            cli.device_selector()
        );
    }

    #[test]
    fn name_prefix_defaults_to_ve_direct() {
        let cli = Args::try_parse_from(["phoenix", "inspect"]).expect("inspect should parse");
        assert_eq!(
            DeviceSelector::NamePrefix("VE.Direct".to_string()),
            cli.device_selector()
        );
    }

    #[test]
    fn monitor_accepts_limits_and_durations() {
        let cli = Args::try_parse_from([
            "phoenix",
            "monitor",
            "--max-readings",
            "5",
            "--refresh-after",
            "15s",
            "--no-demo-cadence",
        ])
        .expect("monitor flags should parse");

        let (command, _) = cli
            .into_command_and_fake_args()
            .expect("real mode needs no fixtures");
        let Command::Monitor(args) = command else {
            panic!("expected monitor command");
        };
        let options = args.session_options();
        assert_eq!(Some(5), options.max_readings());
        assert_eq!(Duration::from_secs(15), options.watchdog().stale_after());
        assert_eq!(false, options.demo_cadence());
    }

    #[test]
    fn power_requires_a_known_mode() {
        let cli = Args::try_parse_from(["phoenix", "power", "eco"]).expect("eco is a mode");
        assert_matches!(cli.command, Command::Power(args) if args.mode() == PowerMode::Eco);

        let error = Args::try_parse_from(["phoenix", "power", "standby"])
            .expect_err("standby is not a mode");
        assert_eq!(ErrorKind::InvalidValue, error.kind());
    }

    #[test]
    fn log_levels_map_to_filters() {
        assert_eq!(LevelFilter::DEBUG, LogLevel::Debug.as_level_filter());
    }
}
