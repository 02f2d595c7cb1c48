pub mod monitoring_service;
