use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta as KubeObjectMeta, Time};
use serde::{Deserialize, Serialize};

use crate::core::crd::Condition;

/// Object metadata as the console sees it; timestamps are unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub resource_version: String,
    pub creation_timestamp: i64,
    pub deletion_timestamp: i64,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerReference {
    pub uid: String,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionView {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub last_transition_time: String,
}

pub fn unix_seconds(time: Option<&Time>) -> i64 {
    time.map(|t| t.0.timestamp()).unwrap_or(0)
}

impl From<&KubeObjectMeta> for ObjectMeta {
    fn from(meta: &KubeObjectMeta) -> Self {
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            uid: meta.uid.clone().unwrap_or_default(),
            resource_version: meta.resource_version.clone().unwrap_or_default(),
            creation_timestamp: unix_seconds(meta.creation_timestamp.as_ref()),
            deletion_timestamp: unix_seconds(meta.deletion_timestamp.as_ref()),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            owner_references: meta
                .owner_references
                .iter()
                .flatten()
                .map(|r| OwnerReference {
                    uid: r.uid.clone(),
                    name: r.name.clone(),
                    kind: r.kind.clone(),
                })
                .collect(),
        }
    }
}

impl From<&Condition> for ConditionView {
    fn from(c: &Condition) -> Self {
        Self {
            type_: c.type_.clone(),
            status: c.status.clone(),
            reason: c.reason.clone(),
            message: c.message.clone(),
            last_transition_time: c
                .last_transition_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_meta_from_kube() {
        let meta = KubeObjectMeta {
            name: Some("web".into()),
            namespace: Some("ns".into()),
            creation_timestamp: Some(Time(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())),
            labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
            ..Default::default()
        };
        let view = ObjectMeta::from(&meta);
        assert_eq!(view.name, "web");
        assert_eq!(view.creation_timestamp, 1704164645);
        assert_eq!(view.deletion_timestamp, 0);
        assert_eq!(view.labels["app"], "web");
    }
}
