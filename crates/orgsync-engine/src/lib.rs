//! # orgsync engine
//!
//! Reconciles a declarative description of a GitHub organization against
//! its live state, emitting the minimal set of mutating operations that
//! drives live toward declared.
//!
//! One reconciliation wraps a cached live snapshot in a mutable
//! [`mirror::LiveMirror`], then runs four ordered passes (users, teams,
//! repositories, rulesets) over [`diff::compare_entities`]. Every
//! mutation flows through the [`reconciler::Reconciler`] mediator, which
//! logs the intent with actor attribution, updates the mirror so later
//! passes observe the change, and forwards to an optional
//! [`executor::Executor`], the seam behind which the real platform
//! client lives. Destructive operations are gated by policy flags in
//! [`config::OrgConfig`]; dry-run updates the mirror identically while
//! instructing the executor not to touch the remote.

pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod mirror;
pub mod model;
pub mod reconciler;
pub mod slug;

pub use config::{DestructiveOperations, OrgConfig, RulesetBinding};
pub use context::ReconcileContext;
pub use diff::{compare_entities, string_multiset_diff, DiffEvent};
pub use error::{EngineError, EngineResult, ExecutorError};
pub use executor::{Executor, RecordedCall, RecordedOperation, RecordingExecutor};
pub use mirror::LiveMirror;
pub use model::{
    BypassApp, DeclaredOrg, DeclaredRepo, DeclaredRuleSet, DeclaredTeam, DeclaredUser, LiveRepo,
    LiveSnapshot, LiveTeam, RuleEnforcement, RuleSet, RuleSetOn, RuleSpec,
};
pub use reconciler::Reconciler;
pub use slug::slugify;
