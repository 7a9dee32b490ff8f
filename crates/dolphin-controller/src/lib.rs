// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod apply;
pub mod controller;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod status;
pub mod synthesizer;
pub mod template;
pub mod volumes;

// Re-export primary types
pub use apply::{Applier, ApplyVerb, StoreApplier};
pub use error::{ControllerError, Result};
pub use policy::{ContainerRole, PolicyConstants, ProbeTiming};
pub use reconciler::{ConvergenceAction, Reconciler};
pub use status::{evaluate, StatusReport};
pub use synthesizer::{synthesize, DesiredState};
pub use volumes::VolumeRole;

// Re-export the controller loop
pub use controller::{ClusterController, ClusterControllerConfig, PassSummary};
