pub mod cluster_service;
pub mod platform_service;
