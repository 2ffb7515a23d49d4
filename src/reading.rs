use serde::{Serialize, Serializer};
use strum_macros::Display;
use thiserror::Error;
use tracing::instrument;

/// Length of a regular telemetry frame.
pub const FRAME_LEN: usize = 8;
/// Length of the short power-state frame.
pub const SHORT_FRAME_LEN: usize = 7;

const OUTPUT_VOLTAGE_CODE: u16 = 34;
const INPUT_VOLTAGE_CODE: u16 = 36333;
const OUTPUT_POWER_CODE: u16 = 290;

const VOLTAGE_SCALE: f64 = 0.01;
const CURRENT_SCALE: f64 = 0.1;

const OUTPUT_POWER_OFF: u16 = 0;
const OUTPUT_POWER_ON: u16 = 65534;

const POWER_SWITCH_ECHO_CODE: u16 = 0;
const POWER_STATE_REPORT_CODE: u16 = 1;

/// Power mode as echoed back after a power switch write.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSwitchState {
    #[strum(to_string = "on")]
    On,
    #[strum(to_string = "off")]
    Off,
    #[strum(to_string = "eco")]
    Eco,
    #[strum(to_string = "unknown")]
    Unknown,
}

/// Power state reported by the inverter on its own.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    #[strum(to_string = "off")]
    Off,
    #[strum(to_string = "eco")]
    Eco,
    #[strum(to_string = "on")]
    On,
    #[strum(to_string = "unknown")]
    Unknown,
}

/// Output power channel state; carries the load current while running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OutputPower {
    Off,
    On,
    Current { amps: f64 },
}

/// A decoded telemetry value or device-state report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    OutputVoltage { volts: f64 },
    InputVoltage { volts: f64 },
    OutputPower { power: OutputPower },
    PowerSwitchEcho { state: PowerSwitchState },
    PowerStateReport { state: PowerState },
    /// Frame with a type code nobody has mapped yet.
    Unrecognized {
        type_code: u16,
        raw_value: u16,
        #[serde(serialize_with = "serialize_hex")]
        frame: Vec<u8>,
    },
}

/// Errors returned while decoding frames.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameDecodeError {
    #[error("frames must be 7 or 8 bytes long, got {len}")]
    UnexpectedLength { len: usize },
}

/// Decodes raw Phoenix frames into typed readings.
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decodes one 8-byte or 7-byte frame.
    ///
    /// Unknown type codes come back as [`Reading::Unrecognized`].
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is neither 7 nor 8 bytes long.
    #[instrument(skip(frame), level = "trace", fields(frame_len = frame.len()))]
    pub fn decode(frame: &[u8]) -> Result<Reading, FrameDecodeError> {
        match frame.len() {
            FRAME_LEN => Ok(Self::decode_long(frame)),
            SHORT_FRAME_LEN => Ok(Self::decode_short(frame)),
            len => Err(FrameDecodeError::UnexpectedLength { len }),
        }
    }

    fn decode_long(frame: &[u8]) -> Reading {
        let type_code = u16::from_le_bytes([frame[3], frame[4]]);
        let raw_value = u16::from_le_bytes([frame[6], frame[7]]);

        match type_code {
            OUTPUT_VOLTAGE_CODE => Reading::OutputVoltage {
                volts: f64::from(raw_value) * VOLTAGE_SCALE,
            },
            INPUT_VOLTAGE_CODE => Reading::InputVoltage {
                volts: f64::from(raw_value) * VOLTAGE_SCALE,
            },
            OUTPUT_POWER_CODE => Reading::OutputPower {
                power: match raw_value {
                    OUTPUT_POWER_OFF => OutputPower::Off,
                    OUTPUT_POWER_ON => OutputPower::On,
                    raw => OutputPower::Current {
                        amps: f64::from(raw) * CURRENT_SCALE,
                    },
                },
            },
            _ => Reading::Unrecognized {
                type_code,
                raw_value,
                frame: frame.to_vec(),
            },
        }
    }

    // Short frames carry single bytes whose decimal rendering is read back
    // as hexadecimal. Observed device output depends on this.
    fn decode_short(frame: &[u8]) -> Reading {
        let type_code = decimal_digits_as_hex(frame[4]);
        let raw_value = decimal_digits_as_hex(frame[6]);

        match type_code {
            POWER_SWITCH_ECHO_CODE => Reading::PowerSwitchEcho {
                state: match raw_value {
                    2 => PowerSwitchState::On,
                    4 => PowerSwitchState::Off,
                    5 => PowerSwitchState::Eco,
                    _ => PowerSwitchState::Unknown,
                },
            },
            POWER_STATE_REPORT_CODE => Reading::PowerStateReport {
                state: match raw_value {
                    0 => PowerState::Off,
                    1 => PowerState::Eco,
                    9 => PowerState::On,
                    _ => PowerState::Unknown,
                },
            },
            _ => Reading::Unrecognized {
                type_code,
                raw_value,
                frame: frame.to_vec(),
            },
        }
    }
}

/// Reads the decimal digits of `byte` as if they were hexadecimal, so 16 becomes 0x16.
fn decimal_digits_as_hex(byte: u8) -> u16 {
    let hundreds = u16::from(byte / 100);
    let tens = u16::from(byte / 10 % 10);
    let ones = u16::from(byte % 10);
    hundreds * 0x100 + tens * 0x10 + ones
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}
