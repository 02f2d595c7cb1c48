use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::resource::dto::volume_view::PersistentVolumeClaimView;

/// How the volume behind a storage is provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    #[default]
    #[serde(rename = "StorageTypeUnspecified")]
    Unspecified,
    #[serde(rename = "LocalPV")]
    LocalPv,
    #[serde(rename = "NFS")]
    Nfs,
    /// Dynamically provisioned through a storage class.
    #[serde(rename = "PVC")]
    Pvc,
}

impl StorageType {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Unspecified => "StorageTypeUnspecified",
            StorageType::LocalPv => "LocalPV",
            StorageType::Nfs => "NFS",
            StorageType::Pvc => "PVC",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "LocalPV" => StorageType::LocalPv,
            "NFS" => StorageType::Nfs,
            "PVC" => StorageType::Pvc,
            _ => StorageType::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStorageRequest {
    #[serde(default)]
    pub storage_name: String,
    #[serde(default)]
    pub namespace: String,
    /// Quantity such as `10Gi`.
    #[serde(default)]
    pub storage_size: String,
    /// `RWO`, `ROX` or `RWX`.
    #[serde(default)]
    pub access_mode: String,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default)]
    pub storage_class_name: String,
    #[serde(default)]
    pub nfs_server: String,
    #[serde(default)]
    pub data_path: String,
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub node_name: String,
}

/// `?namespace=&name=&phase=&storageType=&isManage=` on the storage list.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StorageFilter {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub storage_type: String,
    /// Only claims created through the console.
    #[serde(default)]
    pub is_manage: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageView {
    pub persistent_volume_claim: PersistentVolumeClaimView,
    pub storage_type: StorageType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_from_json() {
        let req: CreateStorageRequest = serde_json::from_value(serde_json::json!({
            "storageName": "datasets",
            "namespace": "team-a",
            "storageSize": "100Gi",
            "accessMode": "RWX",
            "storageType": "NFS",
            "nfsServer": "10.0.0.2",
            "dataPath": "/export/datasets"
        }))
        .unwrap();
        assert_eq!(req.storage_type, StorageType::Nfs);
        assert_eq!(req.nfs_server, "10.0.0.2");
        assert!(req.local_path.is_empty());
    }
}
