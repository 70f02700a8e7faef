//! Shared fixtures for reconciliation integration tests.

use std::collections::BTreeMap;

use orgsync_engine::{
    DeclaredOrg, DeclaredRepo, DeclaredRuleSet, DeclaredTeam, DeclaredUser, LiveRepo,
    LiveSnapshot, LiveTeam, OrgConfig, ReconcileContext, RecordedCall, RecordedOperation,
    Reconciler, RecordingExecutor,
};

/// Builder for declared organizations.
#[derive(Default)]
pub struct OrgBuilder {
    org: DeclaredOrg,
}

impl OrgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, name: &str, github_id: &str) -> Self {
        self.org
            .users
            .insert(name.to_string(), DeclaredUser { github_id: github_id.to_string() });
        self
    }

    pub fn external_user(mut self, name: &str, github_id: &str) -> Self {
        self.org
            .external_users
            .insert(name.to_string(), DeclaredUser { github_id: github_id.to_string() });
        self
    }

    pub fn team(mut self, name: &str, members: &[&str], owners: &[&str]) -> Self {
        self.org.teams.insert(
            name.to_string(),
            DeclaredTeam {
                members: members.iter().map(|m| (*m).to_string()).collect(),
                owners: owners.iter().map(|o| (*o).to_string()).collect(),
            },
        );
        self
    }

    pub fn repo(mut self, name: &str, repo: DeclaredRepo) -> Self {
        self.org.repositories.insert(name.to_string(), repo);
        self
    }

    pub fn ruleset(mut self, ruleset: DeclaredRuleSet) -> Self {
        self.org.rulesets.insert(ruleset.name.clone(), ruleset);
        self
    }

    pub fn build(self) -> DeclaredOrg {
        self.org
    }
}

/// Builder for live snapshots.
#[derive(Default)]
pub struct LiveBuilder {
    snapshot: LiveSnapshot,
}

impl LiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, github_id: &str) -> Self {
        self.snapshot.users.insert(github_id.to_string());
        self
    }

    pub fn team(mut self, slug: &str, members: &[&str]) -> Self {
        self.snapshot.teams.insert(
            slug.to_string(),
            LiveTeam {
                name: slug.to_string(),
                slug: slug.to_string(),
                members: members.iter().map(|m| (*m).to_string()).collect(),
            },
        );
        self
    }

    pub fn repo(mut self, name: &str, repo: LiveRepo) -> Self {
        self.snapshot.repositories.insert(name.to_string(), repo);
        self
    }

    pub fn team_access(mut self, team_slug: &str, repo_name: &str, permission: &str) -> Self {
        self.snapshot
            .team_repositories
            .entry(team_slug.to_string())
            .or_default()
            .insert(repo_name.to_string(), permission.to_string());
        self
    }

    pub fn enterprise(mut self) -> Self {
        self.snapshot.is_enterprise = true;
        self
    }

    pub fn build(self) -> LiveSnapshot {
        self.snapshot
    }
}

/// Live repository with the given flags and no grants.
pub fn live_repo(is_private: bool, is_archived: bool) -> LiveRepo {
    LiveRepo { is_private, is_archived, external_users: BTreeMap::new() }
}

/// Outcome of one recorded reconciliation.
pub struct RunResult {
    pub calls: Vec<RecordedCall>,
    pub snapshot: LiveSnapshot,
}

impl RunResult {
    /// Forwarded mutations, envelope excluded.
    pub fn ops(&self) -> Vec<RecordedOperation> {
        self.calls
            .iter()
            .map(|call| call.operation.clone())
            .filter(|operation| {
                !matches!(
                    operation,
                    RecordedOperation::Begin
                        | RecordedOperation::Commit
                        | RecordedOperation::Rollback { .. }
                )
            })
            .collect()
    }
}

/// Reconcile with a recording executor and panic on failure.
pub fn run(
    declared: &DeclaredOrg,
    live: &LiveSnapshot,
    config: &OrgConfig,
    teams_repo: &str,
    dryrun: bool,
) -> RunResult {
    let executor = RecordingExecutor::new();
    let reconciler = Reconciler::new(Some(&executor), config);
    let ctx = ReconcileContext::with_author("tests");
    let snapshot = reconciler
        .reconcile(&ctx, declared, live, teams_repo, dryrun)
        .expect("reconciliation should succeed");
    RunResult { calls: executor.calls(), snapshot }
}
