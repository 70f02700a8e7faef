//! Repository configuration recognized by the engine.
//!
//! Lives alongside the declared state in the reference repository and is
//! reloaded with it on every reconciliation.

use serde::{Deserialize, Serialize};

/// Engine options carried by the reference repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrgConfig {
    /// When set, a synthetic `everyone` team containing every declared
    /// user exists and every declared repository gains it as a reader.
    pub everyone_team_enabled: bool,

    /// Organization rulesets to reconcile, as `(pattern, ruleset)` pairs.
    pub rulesets: Vec<RulesetBinding>,

    /// Gates for destructive operation classes. All default to off.
    pub destructive_operations: DestructiveOperations,
}

/// Binds a declared ruleset to the repositories matching a name pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetBinding {
    /// Regular expression matched against repository slugs.
    pub pattern: String,
    /// Name of the declared ruleset to apply.
    pub ruleset: String,
}

/// Per-class opt-ins for destructive operations.
///
/// A gated operation is skipped entirely; the next reconciliation sees the
/// entity still alive and will propose the deletion again.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DestructiveOperations {
    /// Allow removing users from the organization.
    pub allow_destructive_users: bool,
    /// Allow deleting teams.
    pub allow_destructive_teams: bool,
    /// Allow deleting repositories.
    pub allow_destructive_repositories: bool,
    /// Allow deleting rulesets.
    pub allow_destructive_rulesets: bool,
}
