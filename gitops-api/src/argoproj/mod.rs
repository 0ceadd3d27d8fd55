// Partial definitions of the argoproj.io kinds the operator consumes.  Only the fields the
// operator reads or writes are typed; everything else round-trips through the `extra` maps
// so that updates never drop user configuration.
mod argocd;
mod rollout_manager;

pub use argocd::*;
pub use rollout_manager::*;

pub const ARGOPROJ_GROUP: &str = "argoproj.io";
