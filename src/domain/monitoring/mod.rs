pub mod distribution;
pub mod dto;
pub mod metrics;
pub mod query;
pub mod series;
pub mod service;
