use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::hardware::{ConnectedBleSession, DeviceSelector};
use super::model::{
    CharacteristicInfo, FoundDevice, InboundNotification, NotificationStopReason, ServiceInfo,
};
use crate::error::{FixtureError, InteractionError};
use crate::protocol::{self, EndpointId};

// Two bulk fragments and a power-switch echo, as captured from a Phoenix 12/800.
const DEFAULT_NOTIFICATIONS: [(EndpointId, &str); 3] = [
    (EndpointId::Bulk, "0803192200 42d959 0803192200 42da59 08031922"),
    (EndpointId::Bulk, "0042df59 0803192200 42da59 0803192200 42d959"),
    (EndpointId::Control, "08031902004105"),
];

/// Parsed fake scan fixture records.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct ScanFixture {
    devices: Vec<FoundDevice>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let devices = parse_scan_fixture(value)?;
        Ok(Self { devices })
    }
}

/// One scripted notification: the characteristic it arrives on and its bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
struct ScriptedNotification {
    uuid: String,
    payload: Vec<u8>,
}

/// Parsed fake notification fixtures in the form `channel:hex,...`.
#[derive(Debug, Clone)]
pub(crate) struct NotificationScript {
    notifications: Vec<ScriptedNotification>,
}

impl FromStr for NotificationScript {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Ok(Self {
                notifications: Vec::new(),
            });
        }
        let notifications = value
            .split(',')
            .map(parse_notification_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { notifications })
    }
}

/// A write captured by the fake backend.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RecordedWrite {
    uuid: String,
    payload: Vec<u8>,
    at: Instant,
}

impl RecordedWrite {
    /// Endpoint the write targeted, when it is a known one.
    #[must_use]
    pub fn endpoint(&self) -> Option<EndpointId> {
        protocol::endpoint_for_uuid(&self.uuid)
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Tokio clock reading at the time of the write.
    #[must_use]
    pub fn at(&self) -> Instant {
        self.at
    }
}

/// Shared, ordered record of every write sent to a fake device.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
}

impl WriteLog {
    /// Returns a snapshot of all writes so far.
    #[must_use]
    pub fn entries(&self) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, write: RecordedWrite) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(write);
    }
}

/// Settings for constructing a fake hardware backend.
#[derive(Debug, Builder)]
pub(crate) struct FakeBackendConfig {
    scan_fixture: ScanFixture,
    notifications: Option<NotificationScript>,
    #[builder(default)]
    discovery_delay: Duration,
    #[builder(default)]
    notification_interval: Duration,
    #[builder(default)]
    close_after_notifications: bool,
    #[builder(default)]
    missing_endpoints: Vec<EndpointId>,
    #[builder(default)]
    failing_subscriptions: Vec<EndpointId>,
    #[builder(default)]
    failing_writes: Vec<EndpointId>,
    #[builder(default)]
    write_log: WriteLog,
}

/// Fake backend used in tests and non-hardware environments.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    devices: Vec<FoundDevice>,
    services: Vec<ServiceInfo>,
    notifications: Vec<ScriptedNotification>,
    discovery_delay: Duration,
    notification_interval: Duration,
    close_after_notifications: bool,
    failing_subscriptions: Vec<EndpointId>,
    failing_writes: Vec<EndpointId>,
    write_log: WriteLog,
}

impl FakeBackend {
    /// Creates a fake backend from explicit settings.
    pub(crate) fn new(config: FakeBackendConfig) -> Self {
        let notifications = config.notifications.map_or_else(
            default_notifications,
            |script| script.notifications,
        );

        Self {
            devices: config.scan_fixture.into(),
            services: phoenix_services(&config.missing_endpoints),
            notifications,
            discovery_delay: config.discovery_delay,
            notification_interval: config.notification_interval,
            close_after_notifications: config.close_after_notifications,
            failing_subscriptions: config.failing_subscriptions,
            failing_writes: config.failing_writes,
            write_log: config.write_log,
        }
    }

    /// Connects to the first fixture device that matches the selector.
    pub(crate) async fn connect_first_matching_device(
        self,
        selector: &DeviceSelector,
    ) -> Result<FakeDeviceSession, InteractionError> {
        if !self.discovery_delay.is_zero() {
            sleep(self.discovery_delay).await;
        }

        let device = self
            .devices
            .into_iter()
            .find(|device| selector.matches(device))
            .ok_or_else(|| InteractionError::NoMatchingDevice {
                selector: selector.to_string(),
            })?;

        Ok(FakeDeviceSession {
            device,
            services: self.services,
            notifications: self.notifications,
            notification_interval: self.notification_interval,
            close_after_notifications: self.close_after_notifications,
            failing_subscriptions: self.failing_subscriptions,
            failing_writes: self.failing_writes,
            write_log: self.write_log,
            subscribed: Mutex::new(HashSet::new()),
        })
    }
}

/// A connected fake device.
#[derive(Debug)]
pub(crate) struct FakeDeviceSession {
    device: FoundDevice,
    services: Vec<ServiceInfo>,
    notifications: Vec<ScriptedNotification>,
    notification_interval: Duration,
    close_after_notifications: bool,
    failing_subscriptions: Vec<EndpointId>,
    failing_writes: Vec<EndpointId>,
    write_log: WriteLog,
    subscribed: Mutex<HashSet<String>>,
}

impl FakeDeviceSession {
    fn ensure_discovered(&self, uuid: &str) -> Result<(), InteractionError> {
        let discovered = self.services.iter().any(|service| {
            service
                .characteristics()
                .iter()
                .any(|characteristic| characteristic.uuid().eq_ignore_ascii_case(uuid))
        });
        if discovered {
            Ok(())
        } else {
            Err(InteractionError::UnknownCharacteristic {
                uuid: uuid.to_string(),
            })
        }
    }

    fn is_subscribed(&self, uuid: &str) -> bool {
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&uuid.to_ascii_lowercase())
    }
}

fn fails_for(endpoints: &[EndpointId], uuid: &str) -> bool {
    protocol::endpoint_for_uuid(uuid).is_some_and(|endpoint| endpoints.contains(&endpoint))
}

fn fixture_failure(operation: &str) -> btleplug::Error {
    btleplug::Error::RuntimeError(format!("fake {operation} failure"))
}

#[async_trait]
impl ConnectedBleSession for FakeDeviceSession {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    async fn subscribe_uuid(&self, uuid: &str) -> Result<(), InteractionError> {
        self.ensure_discovered(uuid)?;
        if fails_for(&self.failing_subscriptions, uuid) {
            return Err(InteractionError::Subscription {
                uuid: uuid.to_string(),
                source: fixture_failure("subscribe"),
            });
        }
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uuid.to_ascii_lowercase());
        Ok(())
    }

    async fn write_uuid(&self, uuid: &str, payload: &[u8]) -> Result<(), InteractionError> {
        self.ensure_discovered(uuid)?;
        if fails_for(&self.failing_writes, uuid) {
            return Err(InteractionError::Write {
                uuid: uuid.to_string(),
                source: fixture_failure("write"),
            });
        }
        self.write_log.push(RecordedWrite {
            uuid: uuid.to_ascii_lowercase(),
            payload: payload.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn forward_notifications(
        &self,
        sink: mpsc::Sender<InboundNotification>,
        cancel: CancellationToken,
    ) -> Result<NotificationStopReason, InteractionError> {
        for notification in &self.notifications {
            if !self.notification_interval.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => return Ok(NotificationStopReason::Cancelled),
                    () = sleep(self.notification_interval) => {}
                }
            }
            if !self.is_subscribed(&notification.uuid) {
                trace!(uuid = %notification.uuid, "dropping notification for unsubscribed channel");
                continue;
            }

            let inbound =
                InboundNotification::new(notification.uuid.clone(), notification.payload.clone());
            tokio::select! {
                () = cancel.cancelled() => return Ok(NotificationStopReason::Cancelled),
                sent = sink.send(inbound) => {
                    if sent.is_err() {
                        return Ok(NotificationStopReason::ReceiverClosed);
                    }
                }
            }
        }

        if self.close_after_notifications {
            return Ok(NotificationStopReason::StreamClosed);
        }

        tokio::select! {
            () = cancel.cancelled() => Ok(NotificationStopReason::Cancelled),
            () = sink.closed() => Ok(NotificationStopReason::ReceiverClosed),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), InteractionError> {
        Ok(())
    }
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<FoundDevice>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_scan_record(raw_record: &str) -> Result<FoundDevice, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(FixtureError::InvalidRecordFieldCount);
    }
    if fields.iter().any(|field| field.is_empty()) {
        return Err(FixtureError::EmptyRecordField);
    }

    let local_name = (fields[2] != "-").then(|| fields[2].to_string());
    let rssi = if fields[3] == "-" {
        None
    } else {
        Some(fields[3].parse::<i16>()?)
    };

    Ok(FoundDevice::new(
        fields[0].to_string(),
        fields[1].to_string(),
        local_name,
        rssi,
    ))
}

fn parse_notification_record(raw_record: &str) -> Result<ScriptedNotification, FixtureError> {
    let Some((channel, payload)) = raw_record.split_once(':') else {
        return Err(FixtureError::InvalidNotificationRecord {
            record: raw_record.trim().to_string(),
        });
    };

    Ok(ScriptedNotification {
        uuid: parse_channel(channel.trim())?,
        payload: parse_hex(payload)?,
    })
}

fn parse_channel(channel: &str) -> Result<String, FixtureError> {
    let endpoint = match channel.to_ascii_lowercase().as_str() {
        "control" => Some(EndpointId::Control),
        "secondary" => Some(EndpointId::Secondary),
        "bulk" => Some(EndpointId::Bulk),
        _ => None,
    };

    match endpoint {
        Some(endpoint) => Ok(protocol::endpoint_metadata(endpoint).uuid().to_string()),
        None if channel.len() == 36 && channel.matches('-').count() == 4 => {
            Ok(channel.to_ascii_lowercase())
        }
        None => Err(FixtureError::UnknownChannel {
            channel: channel.to_string(),
        }),
    }
}

fn parse_hex(raw_value: &str) -> Result<Vec<u8>, FixtureError> {
    let cleaned: String = raw_value.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).map_err(|source| FixtureError::InvalidHex {
        value: cleaned,
        source,
    })
}

fn default_notifications() -> Vec<ScriptedNotification> {
    DEFAULT_NOTIFICATIONS
        .iter()
        .filter_map(|(endpoint, payload)| {
            Some(ScriptedNotification {
                uuid: protocol::endpoint_metadata(*endpoint).uuid().to_string(),
                payload: parse_hex(payload).ok()?,
            })
        })
        .collect()
}

fn phoenix_services(missing: &[EndpointId]) -> Vec<ServiceInfo> {
    if missing.contains(&EndpointId::ChannelGroup) {
        return Vec::new();
    }

    let characteristic = |endpoint: EndpointId, properties: &[&str]| {
        (!missing.contains(&endpoint)).then(|| {
            CharacteristicInfo::new(
                protocol::endpoint_metadata(endpoint).uuid().to_string(),
                properties.iter().map(|property| (*property).to_string()).collect(),
            )
        })
    };

    let characteristics = [
        characteristic(EndpointId::Control, &["write", "notify"]),
        characteristic(EndpointId::Secondary, &["write", "notify"]),
        characteristic(EndpointId::Bulk, &["notify"]),
    ]
    .into_iter()
    .flatten()
    .collect();

    vec![ServiceInfo::new(
        protocol::endpoint_metadata(EndpointId::ChannelGroup)
            .uuid()
            .to_string(),
        true,
        characteristics,
    )]
}
