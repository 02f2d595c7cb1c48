use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::client::kube_resources::ResourceQuota;
use crate::core::util::constants::{MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE};
use crate::core::util::filter::HasName;
use crate::domain::common::model::meta::unix_seconds;

/// `?namespace=&name=` on the quota list. An empty cluster means the local one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuotaFilter {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

/// Hard limits keyed by resource name, values are quantities.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub hard: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaView {
    pub name: String,
    pub namespace: String,
    pub created_time: i64,
    pub hard: BTreeMap<String, String>,
    pub used: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub is_managed: bool,
    /// Kantaloupeflows in the quota's namespace.
    pub workload: Vec<String>,
}

fn quantities(list: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    list.into_iter()
        .flatten()
        .map(|(k, v)| (k.clone(), v.0.clone()))
        .collect()
}

impl From<&ResourceQuota> for QuotaView {
    fn from(quota: &ResourceQuota) -> Self {
        let labels = quota.metadata.labels.clone().unwrap_or_default();
        Self {
            name: quota.metadata.name.clone().unwrap_or_default(),
            namespace: quota.metadata.namespace.clone().unwrap_or_default(),
            created_time: unix_seconds(quota.metadata.creation_timestamp.as_ref()),
            hard: quantities(quota.spec.as_ref().and_then(|s| s.hard.as_ref())),
            used: quantities(quota.status.as_ref().and_then(|s| s.used.as_ref())),
            is_managed: labels.get(MANAGED_BY_LABEL_KEY).map(String::as_str) == Some(MANAGED_BY_LABEL_VALUE),
            labels,
            workload: Vec::new(),
        }
    }
}

impl HasName for QuotaView {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ResourceQuotaSpec;

    #[test]
    fn test_quota_view_marks_managed() {
        let mut quota = ResourceQuota::default();
        quota.metadata.name = Some("gpu-quota".into());
        quota.metadata.labels = Some(BTreeMap::from([(MANAGED_BY_LABEL_KEY.to_string(), "kantaloupe".to_string())]));
        quota.spec = Some(ResourceQuotaSpec {
            hard: Some(BTreeMap::from([("requests.nvidia.com/gpumem".to_string(), Quantity("40960".into()))])),
            ..Default::default()
        });
        let view = QuotaView::from(&quota);
        assert!(view.is_managed);
        assert_eq!(view.hard["requests.nvidia.com/gpumem"], "40960");
        assert!(view.used.is_empty());
    }
}
