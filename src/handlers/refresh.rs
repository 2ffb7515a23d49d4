use tracing::instrument;

use crate::error::ProtocolError;
use crate::hw::DeviceSession;

use super::{Intent, send_intent};

/// Handler for the keepalive write that keeps notifications flowing.
pub struct RefreshHandler;

impl RefreshHandler {
    /// Sends one refresh to the control channel.
    ///
    /// ```
    /// # async fn demo(session: phoenix::DeviceSession) -> Result<(), phoenix::ProtocolError> {
    /// phoenix::RefreshHandler::refresh(&session).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the BLE write fails.
    #[instrument(skip(session), level = "debug")]
    pub async fn refresh(session: &DeviceSession) -> Result<(), ProtocolError> {
        send_intent(session, Intent::Refresh).await?;
        Ok(())
    }
}
