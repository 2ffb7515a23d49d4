use crate::protocol::EndpointId;
use crate::reading::PowerSwitchState;

/// Symbolic commands understood by the inverter.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display)]
pub enum Intent {
    #[display("handshake_1")]
    HandshakeStep1,
    #[display("handshake_2")]
    HandshakeStep2,
    #[display("handshake_3")]
    HandshakeStep3,
    #[display("secondary_init_1")]
    SecondaryInitStep1,
    #[display("secondary_init_2")]
    SecondaryInitStep2,
    #[display("secondary_init_3")]
    SecondaryInitStep3,
    /// Keeps notifications flowing.
    #[display("refresh")]
    Refresh,
    #[display("power_switch_{_0}")]
    PowerSwitch(PowerSwitchState),
}

/// Encoded bytes and the endpoint they must be written to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Command {
    endpoint: EndpointId,
    payload: &'static [u8],
}

impl Command {
    /// Endpoint the payload is written to.
    #[must_use]
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    /// Raw bytes to write.
    #[must_use]
    pub fn payload(&self) -> &'static [u8] {
        self.payload
    }
}

// Captured from the vendor app; the individual bytes have no known meaning.
const HANDSHAKE_1: &[u8] = &[0xFA, 0x80, 0xFF];
const HANDSHAKE_2: &[u8] = &[0xF9, 0x80];
const HANDSHAKE_3: &[u8] = &[0x01];
const SECONDARY_INIT_1: &[u8] = &[0x01];
const SECONDARY_INIT_2: &[u8] = &[0x03, 0x00];
const SECONDARY_INIT_3: &[u8] = &[
    0x06, 0x00, 0x82, 0x18, 0x93, 0x42, 0x10, 0x27, 0x03, 0x01, 0x03, 0x03,
];
const REFRESH: &[u8] = &[0xF9, 0x41];
const POWER_SWITCH_ON: &[u8] = &[0x06, 0x03, 0x82, 0x19, 0x02, 0x00, 0x41, 0x02];
const POWER_SWITCH_OFF: &[u8] = &[0x06, 0x03, 0x82, 0x19, 0x02, 0x00, 0x41, 0x04];
const POWER_SWITCH_ECO: &[u8] = &[0x06, 0x03, 0x82, 0x19, 0x02, 0x00, 0x41, 0x05];

/// Lookup table from intents to wire bytes.
pub struct CommandCodec;

impl CommandCodec {
    /// Encodes one intent. Intents without a known byte sequence yield `None`.
    #[must_use]
    pub fn encode(intent: Intent) -> Option<Command> {
        let (endpoint, payload) = match intent {
            Intent::HandshakeStep1 => (EndpointId::Control, HANDSHAKE_1),
            Intent::HandshakeStep2 => (EndpointId::Control, HANDSHAKE_2),
            Intent::HandshakeStep3 => (EndpointId::Control, HANDSHAKE_3),
            Intent::SecondaryInitStep1 => (EndpointId::Secondary, SECONDARY_INIT_1),
            Intent::SecondaryInitStep2 => (EndpointId::Secondary, SECONDARY_INIT_2),
            Intent::SecondaryInitStep3 => (EndpointId::Secondary, SECONDARY_INIT_3),
            Intent::Refresh => (EndpointId::Control, REFRESH),
            Intent::PowerSwitch(PowerSwitchState::On) => (EndpointId::Secondary, POWER_SWITCH_ON),
            Intent::PowerSwitch(PowerSwitchState::Off) => {
                (EndpointId::Secondary, POWER_SWITCH_OFF)
            }
            Intent::PowerSwitch(PowerSwitchState::Eco) => {
                (EndpointId::Secondary, POWER_SWITCH_ECO)
            }
            Intent::PowerSwitch(PowerSwitchState::Unknown) => return None,
        };

        Some(Command { endpoint, payload })
    }
}
