pub mod acceleratorcard_service;
