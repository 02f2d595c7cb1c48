/// Kubernetes resource types used across the crate, re-exported from k8s-openapi.

pub use k8s_openapi::api::core::v1::{
    ConfigMap, Container, Event, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod,
    ResourceQuota, Secret,
};

pub use k8s_openapi::api::apps::v1::Deployment;

pub use k8s_openapi::api::storage::v1::StorageClass;

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
