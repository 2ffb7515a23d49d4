use std::fmt::{self, Display, Formatter};

use crate::cli::inspect::InspectReport;

use super::device_view::DeviceView;
use super::painter::Painter;
use super::table::Table;

/// Renders an inspect report: device, Phoenix channels and every GATT service.
pub(crate) struct InspectView<'a> {
    report: &'a InspectReport,
    painter: &'a Painter,
}

impl<'a> InspectView<'a> {
    pub(crate) fn new(report: &'a InspectReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }

    fn channel_table(&self) -> Table {
        let rows: Vec<Vec<String>> = self
            .report
            .channels()
            .iter()
            .map(|channel| {
                let status = match channel.properties() {
                    Some(properties) => self.painter.good(properties.join(",")),
                    None => self.painter.bad("missing"),
                };
                vec![
                    self.painter.value(channel.role()),
                    channel.uuid().to_string(),
                    status,
                ]
            })
            .collect();
        Table::grid(["role", "uuid", "properties"], rows)
    }

    fn service_table(&self) -> Table {
        let rows: Vec<Vec<String>> = self
            .report
            .services()
            .iter()
            .flat_map(|service| {
                let primary = if service.is_primary() { "primary" } else { "secondary" };
                let service_label = format!("{} {}", service.uuid(), self.painter.muted(primary));
                if service.characteristics().is_empty() {
                    return vec![vec![service_label, self.painter.muted("<none>"), String::new()]];
                }
                service
                    .characteristics()
                    .iter()
                    .map(|characteristic| {
                        vec![
                            service_label.clone(),
                            characteristic.uuid().to_string(),
                            characteristic.properties().join(","),
                        ]
                    })
                    .collect()
            })
            .collect();
        Table::grid(["service", "characteristic", "properties"], rows)
    }
}

impl Display for InspectView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let readiness = if self.report.session_ready() {
            self.painter.good("all Phoenix channels present")
        } else {
            self.painter.bad("Phoenix channels missing; a session cannot start")
        };

        write!(f, "{}", self.painter.heading("Connected device:"))?;
        write!(f, "\n{}", DeviceView::new(self.report.device(), self.painter))?;
        writeln!(f)?;
        write!(f, "\n{} {readiness}", self.painter.heading("Phoenix channels:"))?;
        write!(f, "\n{}", self.channel_table())?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("GATT services:"))?;
        write!(f, "\n{}", self.service_table())
    }
}
