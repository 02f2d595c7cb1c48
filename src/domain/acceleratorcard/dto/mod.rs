pub mod acceleratorcard_request;
pub mod acceleratorcard_view;
