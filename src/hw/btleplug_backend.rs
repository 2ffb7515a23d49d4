use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use super::hardware::{ConnectedBleSession, DeviceSelector};
use super::model::{
    CharacteristicInfo, FoundDevice, InboundNotification, NotificationStopReason, ServiceInfo,
};
use crate::error::InteractionError;
use crate::utils::HexBytes;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Real BLE access through the platform `btleplug` manager.
#[derive(Debug)]
pub(crate) struct BtleplugBackend {
    manager: Manager,
}

impl BtleplugBackend {
    pub(crate) async fn new() -> Result<Self, InteractionError> {
        Ok(Self {
            manager: Manager::new().await?,
        })
    }

    /// Scans every adapter until `selector` matches, then connects and
    /// reads the peripheral's GATT table.
    pub(crate) async fn connect_first_matching_device(
        self,
        selector: &DeviceSelector,
    ) -> Result<RealDeviceSession, InteractionError> {
        let adapters = self.named_adapters().await?;
        let (peripheral, device) = scan_until_match(&adapters, selector).await?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;
        info!(device_id = device.device_id(), "peripheral connected");

        let gatt = GattTable::read(&peripheral);
        Ok(RealDeviceSession {
            device,
            gatt,
            peripheral,
        })
    }

    async fn named_adapters(&self) -> Result<Vec<NamedAdapter>, InteractionError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(InteractionError::NoAdapters);
        }

        let mut named = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            named.push(NamedAdapter {
                name: adapter.adapter_info().await?,
                adapter,
            });
        }
        Ok(named)
    }
}

#[instrument(skip(adapters), level = "debug", fields(%selector))]
async fn scan_until_match(
    adapters: &[NamedAdapter],
    selector: &DeviceSelector,
) -> Result<(Peripheral, FoundDevice), InteractionError> {
    info!(adapter_count = adapters.len(), "scanning for inverter");
    for named in adapters {
        named.adapter.start_scan(ScanFilter::default()).await?;
    }

    let mut poll = interval(SCAN_POLL_INTERVAL);
    let found = loop {
        poll.tick().await;
        if let Some(found) = first_match(adapters, selector).await? {
            break found;
        }
    };

    for named in adapters {
        if let Err(error) = named.adapter.stop_scan().await {
            debug!(adapter = %named.name, ?error, "stop_scan failed");
        }
    }
    Ok(found)
}

async fn first_match(
    adapters: &[NamedAdapter],
    selector: &DeviceSelector,
) -> Result<Option<(Peripheral, FoundDevice)>, InteractionError> {
    for named in adapters {
        for peripheral in named.adapter.peripherals().await? {
            let Some(advertised) = peripheral.properties().await? else {
                continue;
            };
            let device = FoundDevice::new(
                named.name.clone(),
                advertised.address.to_string(),
                advertised.local_name,
                advertised.rssi,
            );
            if selector.matches(&device) {
                return Ok(Some((peripheral, device)));
            }
        }
    }
    Ok(None)
}

#[derive(Debug)]
struct NamedAdapter {
    adapter: Adapter,
    name: String,
}

/// Discovered services plus the raw characteristics needed for I/O, keyed by
/// lowercase UUID.
#[derive(Debug, Default)]
struct GattTable {
    services: Vec<ServiceInfo>,
    raw: HashMap<String, Characteristic>,
}

impl GattTable {
    fn read(peripheral: &Peripheral) -> Self {
        let mut table = Self::default();
        for service in peripheral.services() {
            let mut characteristics: Vec<CharacteristicInfo> = service
                .characteristics
                .iter()
                .map(|raw| {
                    let uuid = raw.uuid.to_string().to_lowercase();
                    table.raw.entry(uuid.clone()).or_insert_with(|| raw.clone());
                    CharacteristicInfo::new(uuid, property_labels(raw.properties))
                })
                .collect();
            characteristics.sort_by(|a, b| a.uuid().cmp(b.uuid()));
            table.services.push(ServiceInfo::new(
                service.uuid.to_string().to_lowercase(),
                service.primary,
                characteristics,
            ));
        }
        table.services.sort_by(|a, b| a.uuid().cmp(b.uuid()));
        table
    }

    fn get(&self, uuid: &str) -> Result<&Characteristic, InteractionError> {
        self.raw
            .get(&uuid.to_ascii_lowercase())
            .ok_or_else(|| InteractionError::UnknownCharacteristic {
                uuid: uuid.to_owned(),
            })
    }
}

/// Connection to a real inverter.
#[derive(Debug)]
pub(crate) struct RealDeviceSession {
    device: FoundDevice,
    gatt: GattTable,
    peripheral: Peripheral,
}

#[async_trait]
impl ConnectedBleSession for RealDeviceSession {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    fn services(&self) -> &[ServiceInfo] {
        &self.gatt.services
    }

    async fn subscribe_uuid(&self, uuid: &str) -> Result<(), InteractionError> {
        let characteristic = self.gatt.get(uuid)?;
        self.peripheral
            .subscribe(characteristic)
            .await
            .map_err(|source| InteractionError::Subscription {
                uuid: uuid.to_string(),
                source,
            })
    }

    async fn write_uuid(&self, uuid: &str, payload: &[u8]) -> Result<(), InteractionError> {
        let characteristic = self.gatt.get(uuid)?;
        self.peripheral
            .write(
                characteristic,
                payload,
                write_type_for(characteristic.properties),
            )
            .await
            .map_err(|source| InteractionError::Write {
                uuid: uuid.to_string(),
                source,
            })
    }

    #[instrument(skip(self, sink, cancel), level = "debug")]
    async fn forward_notifications(
        &self,
        sink: mpsc::Sender<InboundNotification>,
        cancel: CancellationToken,
    ) -> Result<NotificationStopReason, InteractionError> {
        let mut notifications = self.peripheral.notifications().await?;

        let stop_reason = loop {
            tokio::select! {
                () = cancel.cancelled() => break NotificationStopReason::Cancelled,
                maybe_notification = notifications.next() => {
                    let Some(notification) = maybe_notification else {
                        break NotificationStopReason::StreamClosed;
                    };
                    let uuid = notification.uuid.to_string();
                    trace!(%uuid, payload = %HexBytes(&notification.value), "notification");
                    let inbound = InboundNotification::new(uuid, notification.value);
                    if sink.send(inbound).await.is_err() {
                        break NotificationStopReason::ReceiverClosed;
                    }
                }
            }
        };

        Ok(stop_reason)
    }

    #[instrument(skip(self), level = "debug")]
    async fn close(self: Box<Self>) -> Result<(), InteractionError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

/// Acknowledged writes when the characteristic allows them.
fn write_type_for(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE) {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    }
}

fn property_labels(flags: CharPropFlags) -> Vec<String> {
    if flags.is_empty() {
        return vec!["none".to_owned()];
    }
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect()
}
