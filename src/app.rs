use std::io;

use anyhow::Result;
use bon::Builder;
use tracing::{info, instrument};

use crate::cli::{Command, DEFAULT_NAME_PREFIX, FakeArgs, LogLevel, OutputFormat};
use crate::hw::{
    DeviceSelector, DeviceSession, HardwareClient,
    fake_hardware_client as build_fake_hardware_client,
    real_hardware_client as build_real_hardware_client,
};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Creates a hardware client backed by the real BLE transport.
#[must_use]
pub fn real_hardware_client() -> Box<dyn HardwareClient> {
    build_real_hardware_client()
}

/// Creates a hardware client backed by fake BLE fixtures.
#[must_use]
pub fn fake_hardware_client(fake_args: FakeArgs) -> Box<dyn HardwareClient> {
    build_fake_hardware_client(fake_args.into_backend_config())
}

/// Session-level app helper for acquiring a Phoenix inverter connection.
pub struct SessionHandler {
    hardware_client: Box<dyn HardwareClient>,
    selector: DeviceSelector,
}

impl SessionHandler {
    /// Creates a session handler that matches the default `VE.Direct` name prefix.
    ///
    /// ```
    /// let handler = phoenix::SessionHandler::new(phoenix::real_hardware_client());
    /// let _ = handler;
    /// ```
    #[must_use]
    pub fn new(hardware_client: Box<dyn HardwareClient>) -> Self {
        Self {
            hardware_client,
            selector: DeviceSelector::NamePrefix(DEFAULT_NAME_PREFIX.to_string()),
        }
    }

    /// Overrides the BLE local-name prefix used when scanning for devices.
    ///
    /// ```
    /// let handler = phoenix::SessionHandler::new(phoenix::real_hardware_client())
    ///     .with_name_prefix("Phoenix");
    /// let _ = handler;
    /// ```
    #[must_use]
    pub fn with_name_prefix(self, name_prefix: impl Into<String>) -> Self {
        self.with_selector(DeviceSelector::NamePrefix(name_prefix.into()))
    }

    /// Replaces how the target device is chosen.
    #[must_use]
    pub fn with_selector(mut self, selector: DeviceSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Connects to the first matching inverter.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or connection fails.
    #[instrument(skip(self), level = "info", fields(selector = %self.selector))]
    pub async fn connect_first(self) -> Result<DeviceSession> {
        let session = self
            .hardware_client
            .connect_first_device(&self.selector)
            .await?;
        info!(device_id = session.device().device_id(), "connected");
        Ok(session)
    }
}

/// Process-level settings that apply to every command.
#[derive(Debug, Clone, Builder)]
pub struct RunSettings {
    #[builder(default = DeviceSelector::NamePrefix(DEFAULT_NAME_PREFIX.to_string()))]
    selector: DeviceSelector,
    log_level: Option<LogLevel>,
    #[builder(default)]
    output_format: OutputFormat,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RunSettings {
    /// Settings taken from parsed global flags.
    #[must_use]
    pub fn from_args(args: &crate::cli::Args, default_format: OutputFormat) -> Self {
        Self::builder()
            .selector(args.device_selector())
            .maybe_log_level(args.log_level())
            .output_format(args.output_format().unwrap_or(default_format))
            .build()
    }
}

/// Runs the CLI command with default settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = phoenix::Args::try_parse_from([
///     "phoenix",
///     "--fake",
///     "--fake-scan",
///     "hci0|AA:BB:CC|VE.Direct Smart|-43",
///     "inspect",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => phoenix::fake_hardware_client(fake_args),
///     None => phoenix::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// phoenix::run(command, &mut out, hardware_client).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
) -> Result<()>
where
    W: io::Write + Send,
{
    run_with_settings(command, out, hardware_client, &RunSettings::default()).await
}

/// Runs the CLI command with explicit device, logging and output settings.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run_with_settings<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    settings: &RunSettings,
) -> Result<()>
where
    W: io::Write + Send,
{
    run_with_clients(command, out, &SystemTerminalClient, hardware_client, settings).await
}

/// Runs the CLI command with injected clients.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl phoenix::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = phoenix::Args::try_parse_from([
///     "phoenix",
///     "--log-level",
///     "trace",
///     "--format",
///     "json",
///     "--fake",
///     "--fake-scan",
///     "hci0|AA:BB:CC|VE.Direct Smart|-43",
///     "inspect",
/// ])?;
/// let settings = phoenix::RunSettings::from_args(&args, phoenix::OutputFormat::Json);
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => phoenix::fake_hardware_client(fake_args),
///     None => phoenix::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// phoenix::run_with_clients(command, &mut out, &FakeTerminal, hardware_client, &settings).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
#[instrument(
    skip(out, terminal_client, hardware_client, settings),
    level = "info",
    fields(command = %command_name(&command), selector = %settings.selector)
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware_client: Box<dyn HardwareClient>,
    settings: &RunSettings,
) -> Result<()>
where
    W: io::Write + Send,
{
    telemetry::initialise_tracing(
        terminal_client.stderr_is_terminal(),
        settings.log_level.map(LogLevel::as_level_filter),
    )?;

    let selector = &settings.selector;
    let output_format = settings.output_format;
    match command {
        Command::Monitor(args) => {
            crate::cli::monitor::run(
                hardware_client,
                selector,
                &args,
                out,
                terminal_client,
                output_format,
            )
            .await
        }
        Command::Power(args) => {
            crate::cli::power::run(
                hardware_client,
                selector,
                &args,
                out,
                terminal_client,
                output_format,
            )
            .await
        }
        Command::Inspect => {
            crate::cli::inspect::run(hardware_client, selector, out, terminal_client, output_format)
                .await
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Monitor(_args) => "monitor",
        Command::Power(_args) => "power",
        Command::Inspect => "inspect",
    }
}
