use std::collections::HashMap;
use std::sync::LazyLock;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Known Phoenix inverter GATT endpoints.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum EndpointId {
    /// Service grouping every notifying Phoenix characteristic.
    #[strum(to_string = "channel_group")]
    ChannelGroup,
    /// Receives the handshake and refresh writes.
    #[strum(to_string = "control")]
    Control,
    /// Short notifications plus secondary init and power switch writes.
    #[strum(to_string = "secondary")]
    Secondary,
    /// High-volume notifications that need reassembly.
    #[strum(to_string = "bulk")]
    Bulk,
}

/// Endpoint category in GATT.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub(crate) enum EndpointKind {
    #[strum(to_string = "service")]
    Service,
    #[strum(to_string = "characteristic")]
    Characteristic,
}

/// Descriptive metadata for one protocol endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
    kind: EndpointKind,
}

impl EndpointMetadata {
    /// Human-readable endpoint name.
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    /// Endpoint UUID in lowercase hyphenated form.
    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }

    pub(crate) fn kind(self) -> EndpointKind {
        self.kind
    }
}

static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> = LazyLock::new(|| {
    EndpointId::iter()
        .map(|endpoint| (endpoint, metadata_for(endpoint)))
        .collect()
});

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    *ENDPOINTS_BY_ID
        .get(&endpoint)
        .unwrap_or(&metadata_for(endpoint))
}

/// Maps a UUID string onto a known endpoint, ignoring case.
pub(crate) fn endpoint_for_uuid(uuid: &str) -> Option<EndpointId> {
    EndpointId::iter().find(|endpoint| endpoint_metadata(*endpoint).uuid().eq_ignore_ascii_case(uuid))
}

/// Characteristics a session cannot run without.
pub(crate) fn required_characteristics() -> impl Iterator<Item = EndpointId> {
    EndpointId::iter()
        .filter(|endpoint| endpoint_metadata(*endpoint).kind() == EndpointKind::Characteristic)
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::ChannelGroup => EndpointMetadata {
            name: "Phoenix channel group",
            uuid: "306b0001-b081-4037-83dc-e59fcc3cdfd0",
            kind: EndpointKind::Service,
        },
        EndpointId::Control => EndpointMetadata {
            name: "Phoenix control",
            uuid: "306b0002-b081-4037-83dc-e59fcc3cdfd0",
            kind: EndpointKind::Characteristic,
        },
        EndpointId::Secondary => EndpointMetadata {
            name: "Phoenix secondary",
            uuid: "306b0003-b081-4037-83dc-e59fcc3cdfd0",
            kind: EndpointKind::Characteristic,
        },
        EndpointId::Bulk => EndpointMetadata {
            name: "Phoenix bulk data",
            uuid: "306b0004-b081-4037-83dc-e59fcc3cdfd0",
            kind: EndpointKind::Characteristic,
        },
    }
}
