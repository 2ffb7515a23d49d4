use std::fmt::{self, Display, Formatter};
use std::io;

use crate::cli::OutputFormat;
use crate::controller::ReadingObserver;
use crate::reading::{OutputPower, Reading};
use crate::utils::HexBytes;

use super::painter::Painter;

/// Renders one reading as a single line.
pub(crate) struct ReadingView<'a> {
    index: u64,
    reading: &'a Reading,
    painter: &'a Painter,
}

impl<'a> ReadingView<'a> {
    pub(crate) fn new(index: u64, reading: &'a Reading, painter: &'a Painter) -> Self {
        Self {
            index,
            reading,
            painter,
        }
    }

    fn label(&self) -> &'static str {
        match self.reading {
            Reading::OutputVoltage { .. } => "output voltage",
            Reading::InputVoltage { .. } => "input voltage",
            Reading::OutputPower { .. } => "output power",
            Reading::PowerSwitchEcho { .. } => "power switch",
            Reading::PowerStateReport { .. } => "power state",
            Reading::Unrecognized { .. } => "unrecognized",
        }
    }

    fn value(&self) -> String {
        match self.reading {
            Reading::OutputVoltage { volts } | Reading::InputVoltage { volts } => {
                format!("{volts:.2} V")
            }
            Reading::OutputPower { power } => match power {
                OutputPower::Off => "off".to_string(),
                OutputPower::On => "on".to_string(),
                OutputPower::Current { amps } => format!("{amps:.1} A"),
            },
            Reading::PowerSwitchEcho { state } => state.to_string(),
            Reading::PowerStateReport { state } => state.to_string(),
            Reading::Unrecognized {
                type_code,
                raw_value,
                frame,
            } => format!("type {type_code} raw {raw_value} [{}]", HexBytes(frame)),
        }
    }
}

impl Display for ReadingView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<15} {}",
            self.painter.muted(format!("#{:<4}", self.index)),
            self.label(),
            self.painter.reading_value(self.reading, self.value())
        )
    }
}

/// Writes readings to the terminal as they arrive.
///
/// The first write failure is kept and every later reading is skipped.
pub(crate) struct ConsoleObserver<'a, W> {
    out: &'a mut W,
    painter: &'a Painter,
    format: OutputFormat,
    count: u64,
    write_error: Option<io::Error>,
}

impl<'a, W> ConsoleObserver<'a, W>
where
    W: io::Write + Send,
{
    pub(crate) fn new(out: &'a mut W, painter: &'a Painter, format: OutputFormat) -> Self {
        Self {
            out,
            painter,
            format,
            count: 0,
            write_error: None,
        }
    }

    /// Returns the first write failure, if any.
    pub(crate) fn into_write_error(self) -> Option<io::Error> {
        self.write_error
    }

    fn write(&mut self, reading: &Reading) -> io::Result<()> {
        match self.format {
            OutputFormat::Pretty => {
                writeln!(self.out, "{}", ReadingView::new(self.count, reading, self.painter))
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut *self.out, reading)?;
                writeln!(self.out)
            }
        }
    }
}

impl<W> ReadingObserver for ConsoleObserver<'_, W>
where
    W: io::Write + Send,
{
    fn on_reading(&mut self, reading: &Reading) {
        if self.write_error.is_some() {
            return;
        }
        self.count += 1;
        if let Err(error) = self.write(reading) {
            self.write_error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::reading::{PowerState, PowerSwitchState};

    #[rstest]
    #[case(Reading::OutputVoltage { volts: 230.01 }, "output voltage", "230.01 V")]
    #[case(Reading::InputVoltage { volts: 13.05 }, "input voltage", "13.05 V")]
    #[case(Reading::OutputPower { power: OutputPower::Current { amps: 4.2 } }, "output power", "4.2 A")]
    #[case(Reading::OutputPower { power: OutputPower::Off }, "output power", "off")]
    #[case(Reading::PowerSwitchEcho { state: PowerSwitchState::Eco }, "power switch", "eco")]
    #[case(Reading::PowerStateReport { state: PowerState::On }, "power state", "on")]
    #[case(
        Reading::Unrecognized { type_code: 7, raw_value: 9, frame: vec![0x08, 0x03] },
        "unrecognized",
        "type 7 raw 9 [08 03]"
    )]
    fn reading_lines_show_label_and_value(
        #[case] reading: Reading,
        #[case] label: &str,
        #[case] value: &str,
    ) {
        let painter = Painter::new(false);
        let line = ReadingView::new(3, &reading, &painter).to_string();
        assert!(line.starts_with("#3"), "{line}");
        assert!(line.contains(label), "{line}");
        assert!(line.ends_with(value), "{line}");
    }

    #[test]
    fn json_observer_writes_one_object_per_line() {
        let painter = Painter::new(false);
        let mut out = Vec::new();
        let mut observer = ConsoleObserver::new(&mut out, &painter, OutputFormat::Json);

        observer.on_reading(&Reading::OutputVoltage { volts: 10.0 });
        observer.on_reading(&Reading::PowerSwitchEcho {
            state: PowerSwitchState::On,
        });
        assert!(observer.into_write_error().is_none());

        let text = String::from_utf8(out).expect("json output is utf-8");
        assert_eq!(
            vec![
                r#"{"kind":"output_voltage","volts":10.0}"#,
                r#"{"kind":"power_switch_echo","state":"on"}"#,
            ],
            text.lines().collect::<Vec<_>>()
        );
    }

    #[test]
    fn pretty_observer_numbers_readings_from_one() {
        let painter = Painter::new(false);
        let mut out = Vec::new();
        let mut observer = ConsoleObserver::new(&mut out, &painter, OutputFormat::Pretty);

        for reading in [
            Reading::OutputVoltage { volts: 230.01 },
            Reading::InputVoltage { volts: 13.05 },
            Reading::OutputPower {
                power: OutputPower::Current { amps: 4.2 },
            },
            Reading::PowerSwitchEcho {
                state: PowerSwitchState::Eco,
            },
            Reading::PowerStateReport {
                state: PowerState::On,
            },
            Reading::Unrecognized {
                type_code: 7,
                raw_value: 9,
                frame: vec![0x08, 0x03],
            },
        ] {
            observer.on_reading(&reading);
        }
        assert!(observer.into_write_error().is_none());

        let text = String::from_utf8(out).expect("pretty output is utf-8");
        assert_snapshot!(text, @r"
            #1    output voltage  230.01 V
            #2    input voltage   13.05 V
            #3    output power    4.2 A
            #4    power switch    eco
            #5    power state     on
            #6    unrecognized    type 7 raw 9 [08 03]
        ");
    }
}
