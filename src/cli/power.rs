use std::io;

use anyhow::Result;
use clap::{Args as ClapArgs, ValueEnum};
use serde::Serialize;
use tracing::{info, instrument};

use crate::app::SessionHandler;
use crate::cli::OutputFormat;
use crate::controller::SessionController;
use crate::handlers::{HandshakeReport, PowerHandler};
use crate::hw::{DeviceSelector, DeviceSession, HardwareClient};
use crate::reading::PowerSwitchState;
use crate::terminal::TerminalClient;
use crate::watchdog::{LivenessClock, WatchdogConfig};

use super::ui::{Painter, PowerResultView};

/// Arguments for the `power` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct PowerArgs {
    /// Power mode to switch the inverter to.
    #[arg(value_enum)]
    mode: PowerMode,
}

impl PowerArgs {
    #[must_use]
    pub fn new(mode: PowerMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub fn mode(&self) -> PowerMode {
        self.mode
    }
}

/// Power modes the inverter accepts.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum PowerMode {
    On,
    Off,
    Eco,
}

impl From<PowerMode> for PowerSwitchState {
    fn from(mode: PowerMode) -> Self {
        match mode {
            PowerMode::On => Self::On,
            PowerMode::Off => Self::Off,
            PowerMode::Eco => Self::Eco,
        }
    }
}

#[derive(Debug, Serialize)]
struct PowerReport<'a> {
    device_id: &'a str,
    power_switch: PowerSwitchState,
    handshake_dropped: Vec<String>,
}

/// Executes the `power` command.
#[instrument(skip(client, out, terminal_client), level = "info", fields(%selector, mode = ?args.mode()))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    selector: &DeviceSelector,
    args: &PowerArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let mode = PowerSwitchState::from(args.mode());
    let session = SessionHandler::new(client)
        .with_selector(selector.clone())
        .connect_first()
        .await?;
    let outcome = switch_power(&session, mode).await;
    let device = session.device().clone();
    let closed = session.close().await;
    let handshake = outcome?;
    closed?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(
                out,
                "{}",
                PowerResultView::new(&device, mode, &handshake, &painter)
            )?;
        }
        OutputFormat::Json => {
            let report = PowerReport {
                device_id: device.device_id(),
                power_switch: mode,
                handshake_dropped: handshake
                    .dropped()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            };
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

async fn switch_power(session: &DeviceSession, mode: PowerSwitchState) -> Result<HandshakeReport> {
    let timing = WatchdogConfig::default();
    let clock = LivenessClock::new(timing.startup_grace());
    let mut controller = SessionController::discover(session, &clock).await?;
    let handshake = controller.initialize().await;
    PowerHandler::set_power_then_refresh(session, mode, timing.trailing_refresh_delay()).await?;
    info!(%mode, "power mode sent");
    Ok(handshake)
}
