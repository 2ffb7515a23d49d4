use owo_colors::{OwoColorize, Style as OwoStyle};

use crate::reading::{OutputPower, PowerState, PowerSwitchState, Reading};

/// Semantic styles used across the terminal views.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Tone {
    Heading,
    Good,
    Bad,
    Warning,
    Muted,
    Value,
}

impl Tone {
    fn style(self) -> OwoStyle {
        let bold = OwoStyle::new().bold();
        match self {
            Self::Heading => bold.cyan(),
            Self::Good => bold.green(),
            Self::Bad => bold.red(),
            Self::Warning => bold.yellow(),
            Self::Muted => OwoStyle::new().dimmed(),
            Self::Value => bold,
        }
    }

    fn for_reading(reading: &Reading) -> Self {
        match reading {
            Reading::OutputPower {
                power: OutputPower::Off,
            }
            | Reading::PowerSwitchEcho {
                state: PowerSwitchState::Off,
            }
            | Reading::PowerStateReport {
                state: PowerState::Off,
            } => Self::Bad,
            Reading::PowerSwitchEcho {
                state: PowerSwitchState::Eco,
            }
            | Reading::PowerStateReport {
                state: PowerState::Eco,
            } => Self::Warning,
            Reading::Unrecognized { .. }
            | Reading::PowerSwitchEcho {
                state: PowerSwitchState::Unknown,
            }
            | Reading::PowerStateReport {
                state: PowerState::Unknown,
            } => Self::Muted,
            _ => Self::Good,
        }
    }
}

/// Styles terminal text, or passes it through untouched when colour is off.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Heading, text.as_ref())
    }

    pub(crate) fn good(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Good, text.as_ref())
    }

    pub(crate) fn bad(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Bad, text.as_ref())
    }

    pub(crate) fn warning(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Warning, text.as_ref())
    }

    pub(crate) fn muted(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Muted, text.as_ref())
    }

    pub(crate) fn value(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Value, text.as_ref())
    }

    /// Colours a reading's value by what it says about the inverter.
    pub(crate) fn reading_value(&self, reading: &Reading, text: impl AsRef<str>) -> String {
        self.paint(Tone::for_reading(reading), text.as_ref())
    }

    fn paint(&self, tone: Tone, text: &str) -> String {
        if self.use_colour {
            text.style(tone.style()).to_string()
        } else {
            text.to_owned()
        }
    }
}
