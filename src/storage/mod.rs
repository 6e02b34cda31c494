pub mod paths;
pub mod snapshot_store;

pub use paths::*;
pub use snapshot_store::*;
