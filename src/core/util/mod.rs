pub mod annotations;
pub mod constants;
pub mod controllers;
pub mod fanout;
pub mod filter;
pub mod namespace;
pub mod page;
pub mod quantity;
pub mod random;
pub mod sort;
pub mod time_range;
pub mod validation;
