pub mod monitoring_request;
