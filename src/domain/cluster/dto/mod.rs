pub mod cluster_request;
pub mod cluster_view;
