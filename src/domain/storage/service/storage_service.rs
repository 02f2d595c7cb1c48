//! Console-managed storage: a claim, plus the static volume it binds to for
//! local and NFS storage.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    LocalVolumeSource, NFSVolumeSource, NodeSelector, NodeSelectorRequirement, NodeSelectorTerm,
    PersistentVolumeClaimSpec, PersistentVolumeSpec, VolumeNodeAffinity, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use tracing::{info, warn};

use crate::core::client::kube_resources::{ObjectMeta, PersistentVolume, PersistentVolumeClaim, StorageClass};
use crate::core::client::other_resources::{
    create_cluster_scoped, create_namespaced, delete_cluster_scoped, delete_namespaced, fetch_cluster_scoped,
    fetch_namespaced,
};
use crate::core::util::constants::{
    MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE, PVC_TYPE_LABEL_KEY, STORAGE_TYPE_KEY,
};
use crate::core::util::filter::matches_fuzzy;
use crate::core::util::quantity::parse_quantity;
use crate::core::util::sort::snake_to_camel;
use crate::core::util::validation::require_dns1035;
use crate::domain::cluster::dto::cluster_request::specified;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::resource::dto::resource_request::NameFilter;
use crate::domain::resource::dto::volume_view::{
    parse_access_mode, PersistentVolumeClaimView, PvcPhase, StorageClassView,
};
use crate::domain::storage::dto::storage_request::{CreateStorageRequest, StorageFilter, StorageType, StorageView};
use crate::errors::invalid_argument;

const LOCAL_STORAGE_CLASS: &str = "local-storage";
const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";
const STORAGE: &str = "storage";
const RECLAIM_RETAIN: &str = "Retain";

// ==================== Builders ====================

fn capacity(req: &CreateStorageRequest) -> Result<BTreeMap<String, Quantity>> {
    parse_quantity(&req.storage_size)
        .map_err(|e| invalid_argument(format!("invalid StorageSize: {}", e)))?;
    Ok(BTreeMap::from([(STORAGE.to_string(), Quantity(req.storage_size.clone()))]))
}

fn validate(cluster: &str, req: &CreateStorageRequest) -> Result<()> {
    if req.storage_name.is_empty() {
        return Err(invalid_argument("storage name can not be empty"));
    }
    if req.namespace.is_empty() {
        return Err(invalid_argument("namespace can not be empty"));
    }
    if req.storage_size.is_empty() {
        return Err(invalid_argument("storage size can not be empty"));
    }
    if req.access_mode.is_empty() {
        return Err(invalid_argument("access mode can not be empty"));
    }
    require_dns1035("cluster name", cluster)?;
    match req.storage_type {
        StorageType::Unspecified => Err(invalid_argument("storageType is required and cannot be unspecified")),
        StorageType::Pvc if req.storage_class_name.is_empty() => {
            Err(invalid_argument("storageClass name is required for StorageType_PVC"))
        }
        _ => Ok(()),
    }
}

fn static_volume(req: &CreateStorageRequest, class: String, spec: PersistentVolumeSpec) -> Result<PersistentVolume> {
    Ok(PersistentVolume {
        metadata: ObjectMeta {
            name: Some(req.storage_name.clone()),
            labels: Some(BTreeMap::from([(
                PVC_TYPE_LABEL_KEY.to_string(),
                req.storage_type.as_str().to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            capacity: Some(capacity(req)?),
            access_modes: Some(parse_access_mode(&req.access_mode)?),
            persistent_volume_reclaim_policy: Some(RECLAIM_RETAIN.to_string()),
            storage_class_name: Some(class),
            ..spec
        }),
        ..Default::default()
    })
}

/// NFS export as a volume in its own per-namespace class.
pub fn nfs_volume(req: &CreateStorageRequest) -> Result<PersistentVolume> {
    if req.nfs_server.is_empty() || req.data_path.is_empty() {
        return Err(invalid_argument("NFS PV requires NFSServer and DataPath"));
    }
    let class = format!("{}-{}", req.namespace, req.storage_name);
    static_volume(
        req,
        class,
        PersistentVolumeSpec {
            nfs: Some(NFSVolumeSource {
                server: req.nfs_server.clone(),
                path: req.data_path.clone(),
                read_only: None,
            }),
            ..Default::default()
        },
    )
}

/// Host directory volume pinned to one node.
pub fn local_volume(req: &CreateStorageRequest) -> Result<PersistentVolume> {
    if req.local_path.is_empty() || req.node_name.is_empty() {
        return Err(invalid_argument("local PV requires LocalPath and NodeName"));
    }
    let affinity = VolumeNodeAffinity {
        required: Some(NodeSelector {
            node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: Some(vec![NodeSelectorRequirement {
                    key: HOSTNAME_LABEL.to_string(),
                    operator: "In".to_string(),
                    values: Some(vec![req.node_name.clone()]),
                }]),
                match_fields: None,
            }],
        }),
    };
    static_volume(
        req,
        LOCAL_STORAGE_CLASS.to_string(),
        PersistentVolumeSpec {
            local: Some(LocalVolumeSource {
                path: req.local_path.clone(),
                fs_type: None,
            }),
            node_affinity: Some(affinity),
            ..Default::default()
        },
    )
}

/// The claim of a storage. A static volume's class takes precedence over the requested one.
pub fn storage_claim(req: &CreateStorageRequest, volume: Option<&PersistentVolume>) -> Result<PersistentVolumeClaim> {
    let volume_class = volume
        .and_then(|v| v.spec.as_ref())
        .and_then(|s| s.storage_class_name.clone());
    let storage_class_name = volume_class.or_else(|| Some(req.storage_class_name.clone()).filter(|c| !c.is_empty()));

    Ok(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(req.storage_name.clone()),
            namespace: Some(req.namespace.clone()),
            labels: Some(BTreeMap::from([
                (PVC_TYPE_LABEL_KEY.to_string(), req.storage_type.as_str().to_string()),
                (MANAGED_BY_LABEL_KEY.to_string(), MANAGED_BY_LABEL_VALUE.to_string()),
            ])),
            annotations: Some(BTreeMap::from([(
                STORAGE_TYPE_KEY.to_string(),
                req.storage_type.as_str().to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(parse_access_mode(&req.access_mode)?),
            resources: Some(VolumeResourceRequirements {
                requests: Some(capacity(req)?),
                limits: None,
            }),
            storage_class_name,
            volume_name: volume.map(|v| v.name_any()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

// ==================== Operations ====================

/// Create the storage. For local and NFS storage the volume is created first and removed
/// again if its claim cannot be created.
pub async fn create_storage(ctx: &ServiceContext, cluster: &str, req: &CreateStorageRequest) -> Result<StorageView> {
    validate(cluster, req)?;
    let volume = match req.storage_type {
        StorageType::LocalPv => Some(local_volume(req)?),
        StorageType::Nfs => Some(nfs_volume(req)?),
        _ => None,
    };

    let client = ctx.cluster_client(cluster).await?;
    let created_volume = match &volume {
        Some(v) => Some(
            create_cluster_scoped(&client, v)
                .await
                .with_context(|| format!("failed to create {} PersistentVolume", req.storage_type.as_str()))?,
        ),
        None => None,
    };

    let claim = storage_claim(req, created_volume.as_ref())?;
    let created = match create_namespaced(&client, &req.namespace, &claim).await {
        Ok(c) => c,
        Err(err) => {
            if let Some(v) = &created_volume {
                if let Err(rollback) = delete_cluster_scoped::<PersistentVolume>(&client, &v.name_any()).await {
                    warn!(cluster = %cluster, "Failed to roll back volume {}: {:#}", v.name_any(), rollback);
                }
            }
            return Err(err.context(format!(
                "failed to create PersistentVolumeClaim for {}",
                req.storage_type.as_str()
            )));
        }
    };

    info!(cluster = %cluster, "Created {} storage {}/{}", req.storage_type.as_str(), req.namespace, req.storage_name);
    Ok(StorageView {
        persistent_volume_claim: PersistentVolumeClaimView::from(&created),
        storage_type: req.storage_type,
    })
}

pub async fn delete_storage(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<()> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_namespaced::<PersistentVolumeClaim>(&client, namespace, name).await
}

pub fn filter_storages(claims: &[PersistentVolumeClaim], filter: &StorageFilter) -> Vec<PersistentVolumeClaimView> {
    let phase = specified(&filter.phase).and_then(PvcPhase::parse);
    let storage_type = specified(&filter.storage_type)
        .map(StorageType::parse)
        .filter(|t| *t != StorageType::Unspecified);
    claims
        .iter()
        .map(PersistentVolumeClaimView::from)
        .filter(|c| matches_fuzzy(&c.metadata.name, &filter.name))
        .filter(|c| phase.map_or(true, |p| c.status.phase == p))
        .filter(|c| {
            storage_type.map_or(true, |t| {
                c.metadata
                    .annotations
                    .get(STORAGE_TYPE_KEY)
                    .map(|s| StorageType::parse(s))
                    .unwrap_or_default()
                    == t
            })
        })
        .collect()
}

/// Storage lists sort by name (`field_name`) or creation time, newest first unless ascending.
pub fn storage_sort(opts: &ListOptions) -> ListOptions {
    let field = match opts.sort_field.as_str() {
        "field_name" => "metadata.name",
        _ => "metadata.creation_timestamp",
    };
    ListOptions {
        sort_field: field.to_string(),
        ..opts.clone()
    }
}

pub async fn list_storages(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &StorageFilter,
    opts: &ListOptions,
) -> Result<ListResponse<PersistentVolumeClaimView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let selector = format!("{}={}", MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE);
    let selector = filter.is_manage.then_some(selector.as_str());
    let claims: Vec<PersistentVolumeClaim> = fetch_namespaced(&client, &filter.namespace, selector).await?;

    let filtered = filter_storages(&claims, filter);
    Ok(storage_sort(opts).apply(filtered, &snake_to_camel)?)
}

pub async fn list_storage_classes(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &NameFilter,
    opts: &ListOptions,
) -> Result<ListResponse<StorageClassView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let classes: Vec<StorageClass> = fetch_cluster_scoped(&client, None).await?;
    let views: Vec<StorageClassView> = classes
        .iter()
        .map(StorageClassView::from)
        .filter(|c| matches_fuzzy(&c.metadata.name, &filter.name))
        .collect();
    Ok(opts.apply(views, &snake_to_camel)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PersistentVolumeClaimStatus;

    fn request(storage_type: StorageType) -> CreateStorageRequest {
        CreateStorageRequest {
            storage_name: "datasets".into(),
            namespace: "team-a".into(),
            storage_size: "100Gi".into(),
            access_mode: "RWX".into(),
            storage_type,
            nfs_server: "10.0.0.2".into(),
            data_path: "/export".into(),
            local_path: "/mnt/disk1".into(),
            node_name: "gpu-1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validation_order() {
        let mut req = request(StorageType::Pvc);
        assert!(validate("member-1", &req).is_err());
        req.storage_class_name = "standard".into();
        assert!(validate("member-1", &req).is_ok());
        assert!(validate("Member_1", &req).is_err());
        assert!(validate("member-1", &request(StorageType::Unspecified)).is_err());
        req.storage_name.clear();
        assert_eq!(
            crate::errors::classify(validate("member-1", &req).unwrap_err()).to_string(),
            "storage name can not be empty"
        );
    }

    #[test]
    fn test_nfs_volume_and_claim() {
        let req = request(StorageType::Nfs);
        let pv = nfs_volume(&req).unwrap();
        let spec = pv.spec.as_ref().unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some("team-a-datasets"));
        assert_eq!(spec.persistent_volume_reclaim_policy.as_deref(), Some("Retain"));
        assert_eq!(spec.nfs.as_ref().unwrap().server, "10.0.0.2");

        let pvc = storage_claim(&req, Some(&pv)).unwrap();
        let claim_spec = pvc.spec.unwrap();
        assert_eq!(claim_spec.volume_name.as_deref(), Some("datasets"));
        assert_eq!(claim_spec.storage_class_name.as_deref(), Some("team-a-datasets"));
        assert_eq!(claim_spec.access_modes.unwrap(), vec!["ReadWriteMany"]);
        assert_eq!(pvc.metadata.annotations.unwrap()[STORAGE_TYPE_KEY], "NFS");
        assert_eq!(pvc.metadata.labels.unwrap()[MANAGED_BY_LABEL_KEY], "kantaloupe");
    }

    #[test]
    fn test_local_volume_pinned_to_node() {
        let pv = local_volume(&request(StorageType::LocalPv)).unwrap();
        let spec = pv.spec.unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some(LOCAL_STORAGE_CLASS));
        let term = &spec.node_affinity.unwrap().required.unwrap().node_selector_terms[0];
        let expr = &term.match_expressions.as_ref().unwrap()[0];
        assert_eq!(expr.key, HOSTNAME_LABEL);
        assert_eq!(expr.values.as_ref().unwrap(), &vec!["gpu-1".to_string()]);

        let mut bad = request(StorageType::LocalPv);
        bad.node_name.clear();
        assert!(local_volume(&bad).is_err());
    }

    #[test]
    fn test_invalid_size_rejected() {
        let mut req = request(StorageType::Nfs);
        req.storage_size = "lots".into();
        assert!(nfs_volume(&req).is_err());
    }

    #[test]
    fn test_filter_by_phase_and_type() {
        let claim = |name: &str, phase: &str, kind: &str| {
            let mut pvc = PersistentVolumeClaim::default();
            pvc.metadata.name = Some(name.into());
            pvc.metadata.annotations = Some(BTreeMap::from([(STORAGE_TYPE_KEY.to_string(), kind.to_string())]));
            pvc.status = Some(PersistentVolumeClaimStatus {
                phase: Some(phase.into()),
                ..Default::default()
            });
            pvc
        };
        let claims = vec![claim("a", "Bound", "NFS"), claim("b", "Pending", "NFS"), claim("c", "Bound", "PVC")];

        let filter = StorageFilter {
            phase: "PVC_Bound".into(),
            storage_type: "NFS".into(),
            ..Default::default()
        };
        let names: Vec<_> = filter_storages(&claims, &filter).into_iter().map(|c| c.metadata.name).collect();
        assert_eq!(names, vec!["a"]);

        let filter = StorageFilter {
            phase: "PVC_PHASE_UNSPECIFIED".into(),
            storage_type: "StorageTypeUnspecified".into(),
            ..Default::default()
        };
        assert_eq!(filter_storages(&claims, &filter).len(), 3);
    }

    #[test]
    fn test_storage_sort_fields() {
        let opts = ListOptions {
            sort_field: "field_name".into(),
            ..Default::default()
        };
        assert_eq!(storage_sort(&opts).sort_field, "metadata.name");
        assert_eq!(storage_sort(&ListOptions::default()).sort_field, "metadata.creation_timestamp");
    }
}
