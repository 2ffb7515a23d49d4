use std::fmt::{self, Display, Formatter};

use crate::hw::FoundDevice;
use crate::utils::SignalStrength;

use super::painter::Painter;
use super::table::Table;

/// Renders the connected inverter as a key-value table.
pub(crate) struct DeviceView<'a> {
    device: &'a FoundDevice,
    painter: &'a Painter,
}

impl<'a> DeviceView<'a> {
    pub(crate) fn new(device: &'a FoundDevice, painter: &'a Painter) -> Self {
        Self { device, painter }
    }
}

impl Display for DeviceView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self.device.local_name() {
            Some(name) => self.painter.value(name),
            None => self.painter.warning("<unnamed>"),
        };
        let table = Table::key_value(
            self.painter,
            vec![
                ("name", name),
                ("address", self.painter.value(self.device.device_id())),
                ("adapter", self.painter.value(self.device.adapter_name())),
                ("rssi", self.painter.value(SignalStrength(self.device.rssi()).to_string())),
            ],
        );
        write!(f, "{table}")
    }
}
