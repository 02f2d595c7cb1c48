pub mod list;
pub mod meta;
