pub mod kantaloupeflow_request;
pub mod kantaloupeflow_view;
