//! Services for snapshot synchronization and deploy version resolution

pub mod deploy;
pub mod sync;

pub use deploy::{DeployMode, DeploymentVersionDecision, Resolution, TagAction, VersionResolver};
pub use sync::{SyncEngine, SyncOutcome};
