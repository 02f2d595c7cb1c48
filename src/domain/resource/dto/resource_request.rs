use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::ByteString;
use serde::Deserialize;
use validator::Validate;

use crate::core::client::kube_resources::{ObjectMeta as KubeObjectMeta, Secret};
use crate::domain::common::model::meta::ObjectMeta;
use crate::errors::invalid_argument;

/// `?name=` fuzzy filter shared by the plain resource lists.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NameFilter {
    #[serde(default)]
    pub name: String,
}

/// `?name=&resourceQuota=true` on the namespace list.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceFilter {
    #[serde(default)]
    pub name: String,
    /// Attach the names of the managed GPU quotas.
    #[serde(default)]
    pub resource_quota: bool,
}

/// `?kind=POD&kindName=web-0` on the event list. Without a kind, every event in the
/// namespace is returned.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub kind_name: String,
}

/// Involved object kinds an event list can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Pod,
    Deployment,
}

impl EventFilter {
    pub fn kind(&self) -> Option<EventKind> {
        match self.kind.to_uppercase().as_str() {
            "POD" => Some(EventKind::Pod),
            "DEPLOYMENT" => Some(EventKind::Deployment),
            _ => None,
        }
    }
}

/// Body of a secret create or update. Values in `data` are base64 encoded.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SecretRequest {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl SecretRequest {
    pub fn to_secret(&self, namespace: &str) -> anyhow::Result<Secret> {
        let data = self
            .data
            .iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v)
                    .map(|bytes| (k.clone(), ByteString(bytes)))
                    .map_err(|e| invalid_argument(format!("secret key {} is not base64: {}", k, e)))
            })
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        Ok(Secret {
            metadata: KubeObjectMeta {
                name: Some(self.metadata.name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(self.metadata.labels.clone()).filter(|l| !l.is_empty()),
                annotations: Some(self.metadata.annotations.clone()).filter(|a| !a.is_empty()),
                ..Default::default()
            },
            data: Some(data),
            type_: Some(self.type_.clone()).filter(|t| !t.is_empty()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_request_decodes_data() {
        let req: SecretRequest = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "token"},
            "type": "Opaque",
            "data": {"password": "c2VjcmV0"}
        }))
        .unwrap();
        let secret = req.to_secret("team-a").unwrap();
        assert_eq!(secret.metadata.namespace.as_deref(), Some("team-a"));
        assert_eq!(secret.data.unwrap()["password"].0, b"secret".to_vec());
        assert!(secret.metadata.labels.is_none());
    }

    #[test]
    fn test_secret_request_rejects_bad_base64() {
        let req = SecretRequest {
            data: BTreeMap::from([("k".to_string(), "%%%".to_string())]),
            ..Default::default()
        };
        assert!(req.to_secret("ns").is_err());
    }

    #[test]
    fn test_event_kind_case_insensitive() {
        let filter = EventFilter {
            kind: "Pod".into(),
            kind_name: "web-0".into(),
        };
        assert_eq!(filter.kind(), Some(EventKind::Pod));
        assert_eq!(EventFilter::default().kind(), None);
    }
}
