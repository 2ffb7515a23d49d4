use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::btleplug_backend::BtleplugBackend;
use super::fake_backend::{FakeBackend, FakeBackendConfig};
use super::model::{FoundDevice, InboundNotification, NotificationStopReason, ServiceInfo};
use super::session::endpoint_characteristic;
use crate::error::InteractionError;
use crate::protocol::EndpointId;
use crate::utils::HexBytes;

/// Chooses which advertising peripheral to connect to.
#[derive(Debug, Clone, Eq, PartialEq, derive_more::Display)]
pub enum DeviceSelector {
    /// First device whose local name starts with the prefix.
    #[display("name prefix `{_0}`")]
    NamePrefix(String),
    /// Device whose backend identifier equals the value, ignoring case.
    #[display("address `{_0}`")]
    Address(String),
}

impl DeviceSelector {
    pub(crate) fn matches(&self, device: &FoundDevice) -> bool {
        match self {
            Self::NamePrefix(prefix) => device
                .local_name()
                .is_some_and(|name| name.starts_with(prefix.as_str())),
            Self::Address(address) => device.device_id().eq_ignore_ascii_case(address),
        }
    }
}

#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Scans until a device matches `selector`, connects, and discovers its services.
    async fn connect_first_device(
        self: Box<Self>,
        selector: &DeviceSelector,
    ) -> Result<DeviceSession, InteractionError>;
}

/// Builds a hardware client backed by `btleplug`.
pub(crate) fn real_hardware_client() -> Box<dyn HardwareClient> {
    Box::new(RealHardwareClient)
}

/// Builds a hardware client backed by fixtures.
pub(crate) fn fake_hardware_client(config: FakeBackendConfig) -> Box<dyn HardwareClient> {
    info!("using fake BLE backend");
    Box::new(FakeHardwareClient {
        backend: FakeBackend::new(config),
    })
}

#[derive(Debug)]
struct RealHardwareClient;

#[async_trait]
impl HardwareClient for RealHardwareClient {
    async fn connect_first_device(
        self: Box<Self>,
        selector: &DeviceSelector,
    ) -> Result<DeviceSession, InteractionError> {
        let backend = BtleplugBackend::new().await?;
        let session = backend.connect_first_matching_device(selector).await?;
        Ok(DeviceSession::new(Box::new(session)))
    }
}

#[derive(Debug)]
struct FakeHardwareClient {
    backend: FakeBackend,
}

#[async_trait]
impl HardwareClient for FakeHardwareClient {
    async fn connect_first_device(
        self: Box<Self>,
        selector: &DeviceSelector,
    ) -> Result<DeviceSession, InteractionError> {
        let Self { backend } = *self;
        let session = backend.connect_first_matching_device(selector).await?;
        Ok(DeviceSession::new(Box::new(session)))
    }
}

/// Operations a connected backend session provides.
#[async_trait]
pub(crate) trait ConnectedBleSession: Send + Sync + Debug {
    fn device(&self) -> &FoundDevice;

    fn services(&self) -> &[ServiceInfo];

    async fn subscribe_uuid(&self, uuid: &str) -> Result<(), InteractionError>;

    async fn write_uuid(&self, uuid: &str, payload: &[u8]) -> Result<(), InteractionError>;

    async fn forward_notifications(
        &self,
        sink: mpsc::Sender<InboundNotification>,
        cancel: CancellationToken,
    ) -> Result<NotificationStopReason, InteractionError>;

    async fn close(self: Box<Self>) -> Result<(), InteractionError>;
}

/// A connected inverter link.
///
/// Writes may be issued from several tasks at once; the backend serialises
/// them on the link.
#[derive(Debug)]
pub struct DeviceSession {
    inner: Box<dyn ConnectedBleSession>,
}

impl DeviceSession {
    pub(crate) fn new(inner: Box<dyn ConnectedBleSession>) -> Self {
        Self { inner }
    }

    /// Returns details for the connected device.
    #[must_use]
    pub fn device(&self) -> &FoundDevice {
        self.inner.device()
    }

    /// Returns every service and characteristic exposed by the device.
    #[must_use]
    pub fn services(&self) -> &[ServiceInfo] {
        self.inner.services()
    }

    /// Enables notifications on one characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::Subscription`] when the peripheral refuses.
    #[instrument(skip(self), level = "debug")]
    pub async fn subscribe_uuid(&self, uuid: &str) -> Result<(), InteractionError> {
        self.inner.subscribe_uuid(uuid).await
    }

    /// Writes raw bytes to a known endpoint. The call may wait until the link accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::MissingEndpoint`] when the device lacks the
    /// endpoint, or an error if the BLE write fails.
    #[instrument(skip(self, payload), level = "debug", fields(%endpoint, payload_len = payload.len()))]
    pub async fn write_endpoint(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
    ) -> Result<(), InteractionError> {
        let Some(characteristic) = endpoint_characteristic(self.services(), endpoint) else {
            return Err(InteractionError::MissingEndpoint { endpoint });
        };
        debug!(payload = %HexBytes(payload), "writing");
        self.inner.write_uuid(characteristic.uuid(), payload).await
    }

    /// Pushes every inbound notification into `sink` until cancelled or the stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification stream cannot be opened.
    pub async fn forward_notifications(
        &self,
        sink: mpsc::Sender<InboundNotification>,
        cancel: CancellationToken,
    ) -> Result<NotificationStopReason, InteractionError> {
        self.inner.forward_notifications(sink, cancel).await
    }

    /// Disconnects from the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to disconnect.
    pub async fn close(self) -> Result<(), InteractionError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn device(device_id: &str, local_name: Option<&str>) -> FoundDevice {
        FoundDevice::new(
            "hci0".to_string(),
            device_id.to_string(),
            local_name.map(str::to_string),
            Some(-60),
        )
    }

    #[rstest]
    #[case(DeviceSelector::NamePrefix("VE.Direct".into()), device("AA:BB", Some("VE.Direct Smart")), true)]
    #[case(DeviceSelector::NamePrefix("VE.Direct".into()), device("AA:BB", None), false)]
    #[case(DeviceSelector::Address("aa:bb".into()), device("AA:BB", None), true)]
    #[case(DeviceSelector::Address("AA:BC".into()), device("AA:BB", Some("VE.Direct Smart")), false)]
    fn selector_matches_devices(
        #[case] selector: DeviceSelector,
        #[case] device: FoundDevice,
        #[case] expected: bool,
    ) {
        assert_eq!(expected, selector.matches(&device));
    }
}
