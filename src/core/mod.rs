pub mod client;
pub mod crd;
pub mod util;
