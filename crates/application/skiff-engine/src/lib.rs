pub mod sync;

pub use sync::{DeployEngine, DeploymentPlan, SyncError};
