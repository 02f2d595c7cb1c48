pub mod resource_request;
pub mod resource_view;
pub mod volume_view;
