use std::time::Duration;

pub(crate) mod command;
pub(crate) mod inspect;
pub(crate) mod monitor;
pub(crate) mod power;
pub(crate) mod ui;

pub use self::command::{Args, Command, FakeArgs, LogLevel, OutputFormat};
pub use self::monitor::MonitorArgs;
pub use self::power::{PowerArgs, PowerMode};

pub(crate) const DEFAULT_NAME_PREFIX: &str = "VE.Direct";

pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
