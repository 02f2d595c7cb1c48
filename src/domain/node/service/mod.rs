pub mod node_service;
