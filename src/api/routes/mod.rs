pub mod cluster_routes;
pub mod credential_routes;
pub mod kantaloupeflow_routes;
pub mod monitoring_routes;
pub mod node_routes;
pub mod quota_routes;
pub mod resource_routes;
pub mod storage_routes;
