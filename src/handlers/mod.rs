mod command_codec;
mod handshake;
mod power;
mod refresh;

use tracing::debug;

use crate::error::InteractionError;
use crate::hw::DeviceSession;

pub use self::command_codec::{Command, CommandCodec, Intent};
pub use self::handshake::{HANDSHAKE_SEQUENCE, HandshakeHandler, HandshakeReport};
pub use self::power::PowerHandler;
pub use self::refresh::RefreshHandler;

/// Encodes one intent and writes it to its endpoint. Unmapped intents write nothing.
pub(crate) async fn send_intent(
    session: &DeviceSession,
    intent: Intent,
) -> Result<(), InteractionError> {
    let Some(command) = CommandCodec::encode(intent) else {
        debug!(%intent, "intent has no byte sequence; skipping");
        return Ok(());
    };
    session
        .write_endpoint(command.endpoint(), command.payload())
        .await
}
