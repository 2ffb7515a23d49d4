use std::io;

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::app::SessionHandler;
use crate::cli::OutputFormat;
use crate::hw::{DeviceSelector, FoundDevice, HardwareClient, ServiceInfo, endpoint_characteristic};
use crate::protocol;
use crate::terminal::TerminalClient;

use super::ui::{InspectView, Painter};

/// Whether one Phoenix channel is present on the device.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub(crate) struct ChannelStatus {
    role: String,
    uuid: &'static str,
    properties: Option<Vec<String>>,
}

impl ChannelStatus {
    pub(crate) fn role(&self) -> &str {
        &self.role
    }

    pub(crate) fn uuid(&self) -> &str {
        self.uuid
    }

    /// Properties of the matching characteristic, or `None` when it is missing.
    pub(crate) fn properties(&self) -> Option<&[String]> {
        self.properties.as_deref()
    }
}

/// Device details, channel presence and the full GATT table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub(crate) struct InspectReport {
    device: FoundDevice,
    channels: Vec<ChannelStatus>,
    services: Vec<ServiceInfo>,
}

impl InspectReport {
    pub(crate) fn new(device: FoundDevice, services: Vec<ServiceInfo>) -> Self {
        let channels = protocol::required_characteristics()
            .map(|endpoint| ChannelStatus {
                role: endpoint.to_string(),
                uuid: protocol::endpoint_metadata(endpoint).uuid(),
                properties: endpoint_characteristic(&services, endpoint)
                    .map(|characteristic| characteristic.properties().to_vec()),
            })
            .collect();

        Self {
            device,
            channels,
            services,
        }
    }

    pub(crate) fn device(&self) -> &FoundDevice {
        &self.device
    }

    pub(crate) fn channels(&self) -> &[ChannelStatus] {
        &self.channels
    }

    pub(crate) fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    /// Whether every channel a session needs was found.
    pub(crate) fn session_ready(&self) -> bool {
        self.channels
            .iter()
            .all(|channel| channel.properties.is_some())
    }
}

/// Executes the `inspect` command.
#[instrument(skip(client, out, terminal_client), level = "info", fields(%selector, ?output_format))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    selector: &DeviceSelector,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let session = SessionHandler::new(client)
        .with_selector(selector.clone())
        .connect_first()
        .await?;
    let report = InspectReport::new(session.device().clone(), session.services().to_vec());
    session.close().await?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", InspectView::new(&report, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
