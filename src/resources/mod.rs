pub mod common;
pub mod redisgraph;
pub mod secret;

pub use redisgraph::StorageMode;
