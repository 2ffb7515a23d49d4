use derive_more::From;
use thiserror::Error;

use crate::protocol::{EndpointId, endpoint_metadata};

/// Failures talking to the inverter over BLE.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("bluetooth stack error")]
    Ble(#[from] btleplug::Error),
    #[error("no bluetooth adapter available")]
    NoAdapters,
    #[error("no device matching {selector} was found")]
    NoMatchingDevice { selector: String },
    #[error(
        "inverter exposes no `{name}` channel ({uuid})",
        name = endpoint_metadata(*endpoint).name(),
        uuid = endpoint_metadata(*endpoint).uuid()
    )]
    MissingEndpoint { endpoint: EndpointId },
    #[error("characteristic `{uuid}` was not discovered on the connected device")]
    UnknownCharacteristic { uuid: String },
    #[error("required Phoenix channels are missing: {missing}")]
    MissingRequiredEndpoints { missing: String },
    #[error("failed to enable notifications on `{uuid}`")]
    Subscription {
        uuid: String,
        #[source]
        source: btleplug::Error,
    },
    #[error("failed to write to `{uuid}`")]
    Write {
        uuid: String,
        #[source]
        source: btleplug::Error,
    },
    #[error("could not listen for Ctrl+C")]
    CtrlC { source: std::io::Error },
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// Malformed `--fake-*` fixture input.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("scan fixture lists no devices")]
    EmptyFixture,
    #[error("scan records need `adapter|device_id|local_name|rssi`")]
    InvalidRecordFieldCount,
    #[error("scan record has an empty adapter or device id")]
    EmptyRecordField,
    #[error("rssi is not an integer")]
    InvalidRssi(#[from] std::num::ParseIntError),
    #[error("invalid hex payload `{value}`")]
    InvalidHex {
        value: String,
        #[source]
        source: hex::FromHexError,
    },
    #[error("notification fixtures must look like `channel:hex`, got `{record}`")]
    InvalidNotificationRecord { record: String },
    #[error("unknown fixture channel `{channel}`")]
    UnknownChannel { channel: String },
}

/// Inconsistent command-line options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("--fake needs --fake-scan")]
    MissingFakeScanFixture,
}

#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("tracing subscriber already installed or invalid")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Errors returned by the command handlers.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(InteractionError, Box<InteractionError>)]
    Interaction(Box<InteractionError>),
}
