use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PersistentVolumeClaimCondition;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;

use crate::core::client::kube_resources::{PersistentVolume, PersistentVolumeClaim, StorageClass};
use crate::core::util::filter::HasName;
use crate::domain::common::model::meta::{unix_seconds, ObjectMeta};
use crate::errors::invalid_argument;

const STORAGE: &str = "storage";
const DEFAULT_CLAIM_CLASS: &str = "cluster-default";

/// Expand a short access mode (`RWO`, `ROX`, `RWX`) or its long form into the kubernetes name.
pub fn parse_access_mode(mode: &str) -> anyhow::Result<Vec<String>> {
    let mode = match mode.to_uppercase().as_str() {
        "RWO" | "READWRITEONCE" | "READWRITONCE" => "ReadWriteOnce",
        "ROX" | "READONLYMANY" => "ReadOnlyMany",
        "RWX" | "READWRITEMANY" => "ReadWriteMany",
        _ => return Err(invalid_argument(format!("unsupported AccessMode: {}", mode))),
    };
    Ok(vec![mode.to_string()])
}

fn storage_of(list: Option<&BTreeMap<String, Quantity>>) -> String {
    list.and_then(|l| l.get(STORAGE))
        .map(|q| q.0.clone())
        .filter(|q| q != "0")
        .unwrap_or_default()
}

// ==================== PersistentVolume ====================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPathSource {
    pub path: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsSource {
    pub server: String,
    pub path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSource {
    pub path: String,
    pub fs_type: String,
}

/// Only the sources the console can create are surfaced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSource {
    pub host_path: Option<HostPathSource>,
    pub nfs: Option<NfsSource>,
    pub local: Option<LocalSource>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpecView {
    pub capacity: String,
    pub access_modes: Vec<String>,
    pub persistent_volume_reclaim_policy: String,
    pub volume_mode: String,
    pub storage_class_name: String,
    pub persistent_volume_source: VolumeSource,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeStatusView {
    pub phase: String,
    pub message: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeView {
    pub metadata: ObjectMeta,
    pub spec: PersistentVolumeSpecView,
    pub status: PersistentVolumeStatusView,
}

impl From<&PersistentVolume> for PersistentVolumeView {
    fn from(pv: &PersistentVolume) -> Self {
        let spec = pv.spec.clone().unwrap_or_default();
        let source = VolumeSource {
            host_path: spec.host_path.as_ref().map(|h| HostPathSource {
                path: h.path.clone(),
                type_: h.type_.clone().unwrap_or_default(),
            }),
            nfs: spec.nfs.as_ref().map(|n| NfsSource {
                server: n.server.clone(),
                path: n.path.clone(),
                read_only: n.read_only.unwrap_or(false),
            }),
            local: spec.local.as_ref().map(|l| LocalSource {
                path: l.path.clone(),
                fs_type: l.fs_type.clone().unwrap_or_default(),
            }),
        };
        let status = pv.status.clone().unwrap_or_default();

        Self {
            metadata: ObjectMeta::from(&pv.metadata),
            spec: PersistentVolumeSpecView {
                capacity: storage_of(spec.capacity.as_ref()),
                access_modes: spec.access_modes.clone().unwrap_or_default(),
                persistent_volume_reclaim_policy: spec.persistent_volume_reclaim_policy.clone().unwrap_or_default(),
                volume_mode: spec.volume_mode.clone().unwrap_or_default(),
                storage_class_name: spec.storage_class_name.clone().unwrap_or_default(),
                persistent_volume_source: source,
            },
            status: PersistentVolumeStatusView {
                phase: status.phase.unwrap_or_default(),
                message: status.message.unwrap_or_default(),
                reason: status.reason.unwrap_or_default(),
            },
        }
    }
}

impl HasName for PersistentVolumeView {
    fn name(&self) -> &str {
        &self.metadata.name
    }
}

// ==================== PersistentVolumeClaim ====================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PvcPhase {
    #[default]
    #[serde(rename = "PVC_PHASE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "PVC_Pending")]
    Pending,
    #[serde(rename = "PVC_Bound")]
    Bound,
    #[serde(rename = "PVC_Lost")]
    Lost,
}

impl PvcPhase {
    /// Accepts both the kubernetes phase (`Bound`) and the console name (`PVC_Bound`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim_start_matches("PVC_") {
            "Pending" => Some(PvcPhase::Pending),
            "Bound" => Some(PvcPhase::Bound),
            "Lost" => Some(PvcPhase::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_probe_time: i64,
    pub last_transition_time: i64,
    pub reason: String,
    pub message: String,
}

impl From<&PersistentVolumeClaimCondition> for ClaimCondition {
    fn from(c: &PersistentVolumeClaimCondition) -> Self {
        Self {
            type_: c.type_.clone(),
            status: c.status.clone(),
            last_probe_time: unix_seconds(c.last_probe_time.as_ref()),
            last_transition_time: unix_seconds(c.last_transition_time.as_ref()),
            reason: c.reason.clone().unwrap_or_default(),
            message: c.message.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpecView {
    pub access_modes: Vec<String>,
    pub storage: String,
    pub storage_class_name: String,
    pub volume_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatusView {
    pub phase: PvcPhase,
    pub access_modes: Vec<String>,
    pub capacity: String,
    pub conditions: Vec<ClaimCondition>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimView {
    pub metadata: ObjectMeta,
    pub spec: ClaimSpecView,
    pub status: ClaimStatusView,
}

impl From<&PersistentVolumeClaim> for PersistentVolumeClaimView {
    fn from(pvc: &PersistentVolumeClaim) -> Self {
        let spec = pvc.spec.clone().unwrap_or_default();
        let status = pvc.status.clone().unwrap_or_default();
        let requests = spec.resources.as_ref().and_then(|r| r.requests.as_ref());

        Self {
            metadata: ObjectMeta::from(&pvc.metadata),
            spec: ClaimSpecView {
                access_modes: spec.access_modes.clone().unwrap_or_default(),
                storage: storage_of(requests),
                storage_class_name: spec
                    .storage_class_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CLAIM_CLASS.to_string()),
                volume_name: spec.volume_name.clone().unwrap_or_default(),
            },
            status: ClaimStatusView {
                phase: status.phase.as_deref().and_then(PvcPhase::parse).unwrap_or_default(),
                access_modes: status.access_modes.clone().unwrap_or_default(),
                capacity: storage_of(status.capacity.as_ref()),
                conditions: status.conditions.iter().flatten().map(ClaimCondition::from).collect(),
            },
        }
    }
}

impl HasName for PersistentVolumeClaimView {
    fn name(&self) -> &str {
        &self.metadata.name
    }
}

// ==================== StorageClass ====================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClassView {
    pub metadata: ObjectMeta,
    pub provisioner: String,
    pub storage_class_name: String,
    pub mount_options: Vec<String>,
    pub parameters: BTreeMap<String, String>,
    pub allow_volume_expansion: bool,
    pub reclaim_policy: String,
    pub volume_binding_mode: String,
}

impl From<&StorageClass> for StorageClassView {
    fn from(sc: &StorageClass) -> Self {
        Self {
            metadata: ObjectMeta::from(&sc.metadata),
            provisioner: sc.provisioner.clone(),
            storage_class_name: sc.metadata.name.clone().unwrap_or_default(),
            mount_options: sc.mount_options.clone().unwrap_or_default(),
            parameters: sc.parameters.clone().unwrap_or_default(),
            allow_volume_expansion: sc.allow_volume_expansion.unwrap_or(false),
            reclaim_policy: sc.reclaim_policy.clone().unwrap_or_default(),
            volume_binding_mode: sc.volume_binding_mode.clone().unwrap_or_default(),
        }
    }
}

impl HasName for StorageClassView {
    fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        NFSVolumeSource, PersistentVolumeClaimSpec, PersistentVolumeClaimStatus, PersistentVolumeSpec,
        VolumeResourceRequirements,
    };

    #[test]
    fn test_access_mode_aliases() {
        assert_eq!(parse_access_mode("rwo").unwrap(), vec!["ReadWriteOnce"]);
        assert_eq!(parse_access_mode("ReadOnlyMany").unwrap(), vec!["ReadOnlyMany"]);
        assert_eq!(parse_access_mode("RWX").unwrap(), vec!["ReadWriteMany"]);
        assert!(parse_access_mode("RWOP").is_err());
    }

    #[test]
    fn test_nfs_volume_view() {
        let mut pv = PersistentVolume::default();
        pv.metadata.name = Some("data".into());
        pv.spec = Some(PersistentVolumeSpec {
            capacity: Some(BTreeMap::from([(STORAGE.to_string(), Quantity("10Gi".into()))])),
            access_modes: Some(vec!["ReadWriteMany".into()]),
            nfs: Some(NFSVolumeSource {
                server: "10.0.0.2".into(),
                path: "/export".into(),
                read_only: None,
            }),
            ..Default::default()
        });
        let view = PersistentVolumeView::from(&pv);
        assert_eq!(view.spec.capacity, "10Gi");
        let nfs = view.spec.persistent_volume_source.nfs.unwrap();
        assert_eq!(nfs.server, "10.0.0.2");
        assert!(!nfs.read_only);
        assert!(view.spec.persistent_volume_source.local.is_none());
    }

    #[test]
    fn test_claim_view_defaults() {
        let mut pvc = PersistentVolumeClaim::default();
        pvc.spec = Some(PersistentVolumeClaimSpec {
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(STORAGE.to_string(), Quantity("5Gi".into()))])),
                ..Default::default()
            }),
            ..Default::default()
        });
        pvc.status = Some(PersistentVolumeClaimStatus {
            phase: Some("Bound".into()),
            capacity: Some(BTreeMap::from([(STORAGE.to_string(), Quantity("0".into()))])),
            ..Default::default()
        });
        let view = PersistentVolumeClaimView::from(&pvc);
        assert_eq!(view.spec.storage, "5Gi");
        assert_eq!(view.spec.storage_class_name, "cluster-default");
        assert_eq!(view.status.phase, PvcPhase::Bound);
        assert_eq!(view.status.capacity, "");
    }

    #[test]
    fn test_claim_phase_names() {
        assert_eq!(PvcPhase::parse("PVC_Lost"), Some(PvcPhase::Lost));
        assert_eq!(PvcPhase::parse("Pending"), Some(PvcPhase::Pending));
        assert_eq!(PvcPhase::parse("PVC_PHASE_UNSPECIFIED"), None);
    }
}
