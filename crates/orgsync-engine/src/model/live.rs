//! Live-state snapshot types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::declared::RuleEnforcement;

/// A team as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTeam {
    /// Display name.
    pub name: String,
    /// URL slug; the comparison key.
    pub slug: String,
    /// Member GitHub logins.
    #[serde(default)]
    pub members: Vec<String>,
}

/// A repository as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LiveRepo {
    /// Platform-side visibility flag (inverse of declared `is_public`).
    pub is_private: bool,
    /// Whether the repository is archived.
    pub is_archived: bool,
    /// Per-collaborator permission, `READ` or `WRITE`, keyed by login.
    pub external_users: BTreeMap<String, String>,
}

/// An organization ruleset, shared between the declared comparable and the
/// live view.
///
/// The live side carries the platform `id` needed for updates and deletes;
/// declared comparables leave it unset until the diff copies it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
    /// Platform identifier, present on live rulesets only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Ruleset name.
    pub name: String,
    /// Enforcement mode.
    pub enforcement: RuleEnforcement,
    /// Bypass app name to bypass mode.
    pub bypass_apps: BTreeMap<String, String>,
    /// Ref name patterns the ruleset applies to.
    pub on_include: Vec<String>,
    /// Ref name patterns the ruleset exempts.
    pub on_exclude: Vec<String>,
    /// Rule type to rule parameters.
    pub rules: BTreeMap<String, JsonValue>,
    /// Slugs of the repositories the ruleset targets.
    pub repositories: Vec<String>,
}

/// Read-only snapshot of the live organization.
///
/// Cached across reconciliations; invalidated by an explicit cache flush
/// and replaced by the mirror's view after a successful mutating run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LiveSnapshot {
    /// GitHub logins of the organization members.
    pub users: BTreeSet<String>,
    /// Teams by slug.
    pub teams: BTreeMap<String, LiveTeam>,
    /// Repositories by name.
    pub repositories: BTreeMap<String, LiveRepo>,
    /// Team slug to repository name to platform permission
    /// (`ADMIN`, `WRITE`, `READ`, …).
    pub team_repositories: BTreeMap<String, BTreeMap<String, String>>,
    /// Rulesets by name.
    pub rule_sets: BTreeMap<String, RuleSet>,
    /// Whether the platform advertises enterprise capability; gates the
    /// rulesets pass.
    pub is_enterprise: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_snapshot_deserializes_from_yaml() {
        let yaml = r"
users: [ghAlice, ghBob]
teams:
  platform:
    name: Platform
    slug: platform
    members: [ghAlice]
repositories:
  svc-api:
    isPrivate: true
    externalUsers:
      ghCarol: READ
teamRepositories:
  platform:
    svc-api: WRITE
isEnterprise: true
";
        let snapshot: LiveSnapshot = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.teams["platform"].members, vec!["ghAlice".to_string()]);
        assert!(snapshot.repositories["svc-api"].is_private);
        assert_eq!(
            snapshot.repositories["svc-api"].external_users["ghCarol"],
            "READ"
        );
        assert_eq!(snapshot.team_repositories["platform"]["svc-api"], "WRITE");
        assert!(snapshot.is_enterprise);
        assert!(snapshot.rule_sets.is_empty());
    }
}
