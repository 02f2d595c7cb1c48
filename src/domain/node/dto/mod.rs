pub mod node_request;
pub mod node_view;
