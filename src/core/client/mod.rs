// Kube-rs based Kubernetes clients
pub mod cluster_client_manager;
pub mod kube_client;
pub mod kube_resources;

pub mod clusters;
pub mod kantaloupeflows;
pub mod namespaces;
pub mod nodes;
pub mod other_resources;
pub mod pods;

// Metrics
pub mod prometheus_client;
