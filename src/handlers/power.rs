use std::time::Duration;

use tracing::instrument;

use crate::error::ProtocolError;
use crate::hw::DeviceSession;
use crate::reading::PowerSwitchState;

use super::{Intent, RefreshHandler, send_intent};

/// Handler for inverter power mode commands.
pub struct PowerHandler;

impl PowerHandler {
    /// Sends a power switch command. `PowerSwitchState::Unknown` writes nothing.
    ///
    /// ```
    /// # async fn demo(session: phoenix::DeviceSession) -> Result<(), phoenix::ProtocolError> {
    /// use phoenix::{PowerHandler, PowerSwitchState};
    ///
    /// PowerHandler::set_power(&session, PowerSwitchState::Eco).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the BLE write fails.
    #[instrument(skip(session), level = "debug", fields(%mode))]
    pub async fn set_power(
        session: &DeviceSession,
        mode: PowerSwitchState,
    ) -> Result<(), ProtocolError> {
        send_intent(session, Intent::PowerSwitch(mode)).await?;
        Ok(())
    }

    /// Sends a power switch command, waits `delay`, then sends a refresh.
    ///
    /// # Errors
    ///
    /// Returns an error when either BLE write fails.
    pub async fn set_power_then_refresh(
        session: &DeviceSession,
        mode: PowerSwitchState,
        delay: Duration,
    ) -> Result<(), ProtocolError> {
        Self::set_power(session, mode).await?;
        tokio::time::sleep(delay).await;
        RefreshHandler::refresh(session).await
    }
}
