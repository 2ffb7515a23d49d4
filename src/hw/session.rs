use std::collections::HashMap;

use tracing::instrument;

use super::model::{CharacteristicInfo, ServiceInfo};
use crate::error::InteractionError;
use crate::protocol::{self, EndpointId};

/// Channel handles resolved during discovery. Immutable once built.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ChannelMap {
    by_endpoint: HashMap<EndpointId, String>,
    group_channels: Vec<String>,
}

impl ChannelMap {
    /// Resolved UUID for a role.
    #[must_use]
    pub fn uuid_for(&self, endpoint: EndpointId) -> Option<&str> {
        self.by_endpoint.get(&endpoint).map(String::as_str)
    }

    /// Every characteristic under the channel group service, in discovery order.
    #[must_use]
    pub fn group_channels(&self) -> &[String] {
        &self.group_channels
    }

    /// Classifies an inbound notification by the role of its channel.
    #[must_use]
    pub fn endpoint_for_notification(&self, uuid: &str) -> Option<EndpointId> {
        self.by_endpoint
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(uuid))
            .map(|(endpoint, _)| *endpoint)
    }
}

/// Finds the control, secondary and bulk channels plus every channel in their group.
///
/// # Errors
///
/// Returns [`InteractionError::MissingRequiredEndpoints`] naming every role
/// that could not be found.
#[instrument(skip(services), level = "debug", fields(service_count = services.len()))]
pub(crate) fn resolve_channels(services: &[ServiceInfo]) -> Result<ChannelMap, InteractionError> {
    let mut by_endpoint = HashMap::new();
    let mut missing = Vec::new();

    for endpoint in protocol::required_characteristics() {
        match endpoint_characteristic(services, endpoint) {
            Some(characteristic) => {
                by_endpoint.insert(endpoint, characteristic.uuid().to_ascii_lowercase());
            }
            None => missing.push(endpoint),
        }
    }

    if !missing.is_empty() {
        return Err(InteractionError::MissingRequiredEndpoints {
            missing: format_missing_endpoints(&missing),
        });
    }

    let group_uuid = protocol::endpoint_metadata(EndpointId::ChannelGroup).uuid();
    let group_channels = services
        .iter()
        .filter(|service| service.uuid().eq_ignore_ascii_case(group_uuid))
        .flat_map(ServiceInfo::characteristics)
        .map(|characteristic| characteristic.uuid().to_ascii_lowercase())
        .collect();

    Ok(ChannelMap {
        by_endpoint,
        group_channels,
    })
}

/// Finds the characteristic serving `endpoint` in any service.
pub(crate) fn endpoint_characteristic(
    services: &[ServiceInfo],
    endpoint: EndpointId,
) -> Option<&CharacteristicInfo> {
    let uuid = protocol::endpoint_metadata(endpoint).uuid();
    services
        .iter()
        .find_map(|service| service.characteristic(uuid))
}

fn format_missing_endpoints(missing: &[EndpointId]) -> String {
    missing
        .iter()
        .map(|endpoint| {
            let metadata = protocol::endpoint_metadata(*endpoint);
            format!("{} ({})", metadata.name(), metadata.uuid())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
