pub mod quota_service;
