//! Declared and live views of the organization.
//!
//! Declared entities are rebuilt from the reference repository for every
//! reconciliation and are read-only to the engine. The live snapshot is a
//! cached view of the remote platform; within a reconciliation it is only
//! read through the mutable mirror.

mod declared;
mod live;

pub use declared::{
    BypassApp, DeclaredOrg, DeclaredRepo, DeclaredRuleSet, DeclaredTeam, DeclaredUser,
    RuleEnforcement, RuleSetOn, RuleSpec,
};
pub use live::{LiveRepo, LiveSnapshot, LiveTeam, RuleSet};
