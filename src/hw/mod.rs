mod btleplug_backend;
mod fake_backend;
mod hardware;
mod model;
mod session;

pub(crate) use self::fake_backend::{FakeBackendConfig, NotificationScript, ScanFixture};
pub use self::fake_backend::{RecordedWrite, WriteLog};
pub use self::hardware::{DeviceSelector, DeviceSession, HardwareClient};
pub(crate) use self::hardware::{fake_hardware_client, real_hardware_client};
pub use self::model::{
    CharacteristicInfo, FoundDevice, InboundNotification, NotificationStopReason, ServiceInfo,
};
pub use self::session::ChannelMap;
pub(crate) use self::session::{endpoint_characteristic, resolve_channels};
