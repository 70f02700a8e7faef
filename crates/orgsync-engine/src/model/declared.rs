//! Declared-state entity types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A declared organization member, keyed by logical name.
///
/// The same shape describes external users (collaborators who are not org
/// members but are referenced by repositories for per-repo access).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredUser {
    /// GitHub login of the user.
    #[serde(rename = "githubID")]
    pub github_id: String,
}

/// A declared team.
///
/// Owners are also effective members. Each declared team induces two live
/// teams: the team itself and a `<slug>-owners` sibling containing only
/// the owners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredTeam {
    /// Logical names of the team members.
    pub members: Vec<String>,
    /// Logical names of the team owners.
    pub owners: Vec<String>,
}

/// A declared repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeclaredRepo {
    /// Repository visibility.
    pub is_public: bool,
    /// Whether the repository is archived.
    pub archived: bool,
    /// Team names with read access.
    pub readers: Vec<String>,
    /// Team names with write access.
    pub writers: Vec<String>,
    /// External-user logical names with read access.
    pub external_user_readers: Vec<String>,
    /// External-user logical names with write access.
    pub external_user_writers: Vec<String>,
    /// Owning team, granted write access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Enforcement mode of an organization ruleset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEnforcement {
    /// The ruleset exists but is not applied.
    #[default]
    Disabled,
    /// Violations are reported without being blocked.
    Evaluate,
    /// Violations are blocked.
    Active,
}

impl fmt::Display for RuleEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Evaluate => write!(f, "evaluate"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// An app allowed to bypass a ruleset, with its bypass mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassApp {
    /// Name of the platform app.
    pub app_name: String,
    /// Bypass mode (for example `always` or `pull_request`).
    pub mode: String,
}

/// Name-pattern targeting of a ruleset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSetOn {
    /// Ref name patterns the ruleset applies to.
    pub include: Vec<String>,
    /// Ref name patterns the ruleset exempts.
    pub exclude: Vec<String>,
}

/// One rule inside a ruleset: a rule type with free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Platform rule type (for example `required_status_checks`).
    pub ruletype: String,
    /// Rule parameters, passed through to the platform verbatim.
    #[serde(default)]
    pub parameters: JsonValue,
}

/// A declared organization-wide ruleset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeclaredRuleSet {
    /// Ruleset name; doubles as the comparison key.
    pub name: String,
    /// Enforcement mode.
    pub enforcement: RuleEnforcement,
    /// Apps allowed to bypass the ruleset.
    pub bypass_apps: Vec<BypassApp>,
    /// Ref-pattern targeting.
    pub on: RuleSetOn,
    /// The rules themselves.
    pub rules: Vec<RuleSpec>,
}

/// The whole declared organization, rebuilt from source each run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeclaredOrg {
    /// Organization members by logical name.
    pub users: BTreeMap<String, DeclaredUser>,
    /// External collaborators by logical name.
    pub external_users: BTreeMap<String, DeclaredUser>,
    /// Teams by name.
    pub teams: BTreeMap<String, DeclaredTeam>,
    /// Repositories by name.
    pub repositories: BTreeMap<String, DeclaredRepo>,
    /// Rulesets by name.
    pub rulesets: BTreeMap<String, DeclaredRuleSet>,
}
