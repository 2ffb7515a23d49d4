use std::fmt::{self, Display, Formatter};

use crate::controller::SessionSummary;
use crate::handlers::HandshakeReport;
use crate::hw::FoundDevice;
use crate::reading::PowerSwitchState;

use super::device_view::DeviceView;
use super::painter::Painter;
use super::table::Table;

/// Renders the connection banner shown before readings start.
pub(crate) struct MonitorReadyView<'a> {
    device: &'a FoundDevice,
    painter: &'a Painter,
}

impl<'a> MonitorReadyView<'a> {
    pub(crate) fn new(device: &'a FoundDevice, painter: &'a Painter) -> Self {
        Self { device, painter }
    }
}

impl Display for MonitorReadyView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.painter.heading("Connected device:"))?;
        write!(f, "\n{}", DeviceView::new(self.device, self.painter))?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("Readings:"))
    }
}

/// Renders the counts gathered over a monitoring session.
pub(crate) struct SessionSummaryView<'a> {
    summary: &'a SessionSummary,
    painter: &'a Painter,
}

impl<'a> SessionSummaryView<'a> {
    pub(crate) fn new(summary: &'a SessionSummary, painter: &'a Painter) -> Self {
        Self { summary, painter }
    }
}

impl Display for SessionSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let live = self.summary.live();
        let watchdog = self.summary.watchdog();
        let discovery = self.summary.discovery();
        let count = |value: u64| self.painter.value(value.to_string());
        let flagged = |value: u64| {
            if value == 0 {
                self.painter.value(value.to_string())
            } else {
                self.painter.warning(value.to_string())
            }
        };
        let dropped = self.summary.handshake().dropped().len();

        let table = Table::key_value(
            self.painter,
            vec![
                ("stop_reason", self.painter.value(live.stop_reason().to_string())),
                ("readings", count(live.readings())),
                ("notifications", count(live.notifications())),
                ("undecodable_frames", flagged(live.anomalies())),
                ("subscribed_channels", count(discovery.subscribed().len() as u64)),
                ("unsubscribed_channels", flagged(discovery.failed().len() as u64)),
                ("handshake_writes_dropped", flagged(dropped as u64)),
                ("keepalive_refreshes", count(watchdog.stale_refreshes())),
                ("scheduled_commands", count(watchdog.commands())),
                ("failed_writes", flagged(watchdog.failed_writes())),
            ],
        );

        write!(f, "{}", self.painter.heading("Session summary:"))?;
        write!(f, "\n{table}")
    }
}

/// Renders the result of a one-shot power command.
pub(crate) struct PowerResultView<'a> {
    device: &'a FoundDevice,
    mode: PowerSwitchState,
    handshake: &'a HandshakeReport,
    painter: &'a Painter,
}

impl<'a> PowerResultView<'a> {
    pub(crate) fn new(
        device: &'a FoundDevice,
        mode: PowerSwitchState,
        handshake: &'a HandshakeReport,
        painter: &'a Painter,
    ) -> Self {
        Self {
            device,
            mode,
            handshake,
            painter,
        }
    }
}

impl Display for PowerResultView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let dropped = self.handshake.dropped();
        let handshake = if dropped.is_empty() {
            self.painter.good("complete")
        } else {
            let names: Vec<String> = dropped.iter().map(ToString::to_string).collect();
            self.painter.warning(format!("dropped {}", names.join(", ")))
        };
        let table = Table::key_value(
            self.painter,
            vec![
                ("device", self.painter.value(self.device.device_id())),
                ("handshake", handshake),
                ("power_switch", self.painter.good(self.mode.to_string())),
            ],
        );

        write!(f, "{}", self.painter.heading("Power command sent:"))?;
        write!(f, "\n{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    fn inverter() -> FoundDevice {
        FoundDevice::new(
            "hci0".into(),
            "DE:33:11:25:72:13".into(),
            Some("VE.Direct Smart".into()),
            Some(-43),
        )
    }

    #[test]
    fn ready_banner_introduces_readings() {
        let device = inverter();
        let painter = Painter::new(false);
        assert_snapshot!(MonitorReadyView::new(&device, &painter).to_string(), @r"
            Connected device:
            ╭─────────┬───────────────────╮
            │ field   │ value             │
            ├─────────┼───────────────────┤
            │ name    │ VE.Direct Smart   │
            │ address │ DE:33:11:25:72:13 │
            │ adapter │ hci0              │
            │ rssi    │ -43 dBm           │
            ╰─────────┴───────────────────╯

            Readings:
        ");
    }

    #[test]
    fn power_result_with_complete_handshake() {
        let device = inverter();
        let handshake = HandshakeReport::default();
        let painter = Painter::new(false);
        let view = PowerResultView::new(&device, PowerSwitchState::Eco, &handshake, &painter);
        assert_snapshot!(view.to_string(), @r"
            Power command sent:
            ╭──────────────┬───────────────────╮
            │ field        │ value             │
            ├──────────────┼───────────────────┤
            │ device       │ DE:33:11:25:72:13 │
            │ handshake    │ complete          │
            │ power_switch │ eco               │
            ╰──────────────┴───────────────────╯
        ");
    }
}
