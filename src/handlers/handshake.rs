use tracing::{info, instrument, warn};

use crate::hw::DeviceSession;

use super::{Intent, send_intent};

/// Writes issued after discovery, in order. The trailing refresh starts the data flow.
pub const HANDSHAKE_SEQUENCE: [Intent; 7] = [
    Intent::HandshakeStep1,
    Intent::HandshakeStep2,
    Intent::HandshakeStep3,
    Intent::SecondaryInitStep1,
    Intent::SecondaryInitStep2,
    Intent::SecondaryInitStep3,
    Intent::Refresh,
];

/// Outcome of the initialisation writes.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct HandshakeReport {
    written: Vec<Intent>,
    dropped: Vec<Intent>,
}

impl HandshakeReport {
    /// Intents the link accepted.
    #[must_use]
    pub fn written(&self) -> &[Intent] {
        &self.written
    }

    /// Intents whose write failed and was not retried.
    #[must_use]
    pub fn dropped(&self) -> &[Intent] {
        &self.dropped
    }
}

/// Handler for the fixed initialisation sequence.
pub struct HandshakeHandler;

impl HandshakeHandler {
    /// Sends every handshake write in order without waiting for replies.
    ///
    /// A failed write is logged and dropped; the remaining writes still go out.
    ///
    /// ```
    /// # async fn demo(session: phoenix::DeviceSession) {
    /// let report = phoenix::HandshakeHandler::run(&session).await;
    /// assert!(report.dropped().is_empty());
    /// # }
    /// ```
    #[instrument(skip(session), level = "info")]
    pub async fn run(session: &DeviceSession) -> HandshakeReport {
        let mut report = HandshakeReport::default();
        for intent in HANDSHAKE_SEQUENCE {
            match send_intent(session, intent).await {
                Ok(()) => report.written.push(intent),
                Err(error) => {
                    warn!(%intent, error = %error, "handshake write failed; dropping it");
                    report.dropped.push(intent);
                }
            }
        }
        info!(
            written = report.written.len(),
            dropped = report.dropped.len(),
            "handshake sent"
        );
        report
    }
}
