pub mod context;

pub mod common;

pub mod acceleratorcard;
pub mod cluster;
pub mod credential;
pub mod kantaloupeflow;
pub mod monitoring;
pub mod node;
pub mod quota;
pub mod resource;
pub mod storage;
