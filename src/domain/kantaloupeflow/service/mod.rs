pub mod kantaloupeflow_service;
