use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

use crate::core::client::kube_resources::{ConfigMap, Event, Secret};
use crate::core::util::filter::HasName;
use crate::domain::common::model::meta::{unix_seconds, ObjectMeta};

// ==================== ConfigMap ====================

/// Binary entries are base64 encoded.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapView {
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,
    pub binary_data: BTreeMap<String, String>,
    pub immutable: bool,
}

impl From<&ConfigMap> for ConfigMapView {
    fn from(cm: &ConfigMap) -> Self {
        Self {
            metadata: ObjectMeta::from(&cm.metadata),
            data: cm.data.clone().unwrap_or_default(),
            binary_data: cm
                .binary_data
                .iter()
                .flatten()
                .map(|(k, v)| (k.clone(), STANDARD.encode(&v.0)))
                .collect(),
            immutable: cm.immutable.unwrap_or(false),
        }
    }
}

impl HasName for ConfigMapView {
    fn name(&self) -> &str {
        &self.metadata.name
    }
}

// ==================== Secret ====================

/// Secret payloads never leave the server; only metadata and type are shown.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretView {
    pub metadata: ObjectMeta,
    #[serde(rename = "type")]
    pub type_: String,
}

impl From<&Secret> for SecretView {
    fn from(secret: &Secret) -> Self {
        Self {
            metadata: ObjectMeta::from(&secret.metadata),
            type_: secret.type_.clone().unwrap_or_default(),
        }
    }
}

impl HasName for SecretView {
    fn name(&self) -> &str {
        &self.metadata.name
    }
}

// ==================== Namespace ====================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceView {
    pub name: String,
    /// Managed GPU quotas living in the namespace.
    pub resource_quotas: Vec<String>,
}

impl HasName for NamespaceView {
    fn name(&self) -> &str {
        &self.name
    }
}

// ==================== Event ====================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum EventType {
    #[default]
    #[serde(rename = "EVENT_TYPE_UNSPECIFIED")]
    Unspecified,
    Normal,
    Warning,
}

impl EventType {
    fn parse(raw: &str) -> Self {
        match raw {
            "Normal" => EventType::Normal,
            "Warning" => EventType::Warning,
            _ => EventType::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub component: String,
    pub host: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub involved_object: InvolvedObject,
    pub reason: String,
    pub message: String,
    pub source: EventSource,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    #[serde(rename = "type")]
    pub type_: EventType,
}

impl From<&Event> for EventView {
    /// Events recorded through the events.k8s.io API carry only `eventTime`.
    fn from(event: &Event) -> Self {
        let last_timestamp = match event.last_timestamp.as_ref() {
            Some(t) => unix_seconds(Some(t)),
            None => event.event_time.as_ref().map(|t| t.0.timestamp()).unwrap_or(0),
        };
        let source = event.source.clone().unwrap_or_default();

        Self {
            involved_object: InvolvedObject {
                kind: event.involved_object.kind.clone().unwrap_or_default(),
                name: event.involved_object.name.clone().unwrap_or_default(),
                namespace: event.involved_object.namespace.clone().unwrap_or_default(),
            },
            reason: event.reason.clone().unwrap_or_default(),
            message: event.message.clone().unwrap_or_default(),
            source: EventSource {
                component: source.component.unwrap_or_default(),
                host: source.host.unwrap_or_default(),
            },
            first_timestamp: unix_seconds(event.first_timestamp.as_ref()),
            last_timestamp,
            type_: EventType::parse(event.type_.as_deref().unwrap_or_default()),
        }
    }
}
