//! Downstream executor interface.
//!
//! The executor performs the real mutations against the remote platform.
//! It is optional: with none attached the engine still runs mirror-only,
//! which is what planning and most tests use. Every method receives the
//! `dryrun` flag; a dry-run executor logs what it would do without
//! touching the remote.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::error::{EngineError, ExecutorError};
use crate::model::RuleSet;

/// Imperative mutation catalogue plus the transaction envelope.
///
/// `begin`/`commit`/`rollback` are advisory signals; the engine itself is
/// not transactional and partial application is recovered by the next
/// reconciliation.
#[allow(clippy::missing_errors_doc)]
pub trait Executor {
    fn add_user_to_org(&self, dryrun: bool, github_id: &str) -> Result<(), ExecutorError>;
    fn remove_user_from_org(&self, dryrun: bool, github_id: &str) -> Result<(), ExecutorError>;

    fn create_team(
        &self,
        dryrun: bool,
        slug: &str,
        name: &str,
        members: &[String],
    ) -> Result<(), ExecutorError>;
    fn update_team_add_member(
        &self,
        dryrun: bool,
        team_slug: &str,
        member_id: &str,
        role: &str,
    ) -> Result<(), ExecutorError>;
    fn update_team_remove_member(
        &self,
        dryrun: bool,
        team_slug: &str,
        member_id: &str,
    ) -> Result<(), ExecutorError>;
    fn delete_team(&self, dryrun: bool, team_slug: &str) -> Result<(), ExecutorError>;

    fn create_repository(
        &self,
        dryrun: bool,
        name: &str,
        description: &str,
        writers: &[String],
        readers: &[String],
        public: bool,
    ) -> Result<(), ExecutorError>;
    fn delete_repository(&self, dryrun: bool, name: &str) -> Result<(), ExecutorError>;
    fn update_repository_update_private(
        &self,
        dryrun: bool,
        name: &str,
        private: bool,
    ) -> Result<(), ExecutorError>;
    fn update_repository_update_archived(
        &self,
        dryrun: bool,
        name: &str,
        archived: bool,
    ) -> Result<(), ExecutorError>;
    fn update_repository_add_team_access(
        &self,
        dryrun: bool,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) -> Result<(), ExecutorError>;
    fn update_repository_update_team_access(
        &self,
        dryrun: bool,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) -> Result<(), ExecutorError>;
    fn update_repository_remove_team_access(
        &self,
        dryrun: bool,
        name: &str,
        team_slug: &str,
    ) -> Result<(), ExecutorError>;
    fn update_repository_set_external_user(
        &self,
        dryrun: bool,
        name: &str,
        github_id: &str,
        permission: &str,
    ) -> Result<(), ExecutorError>;
    fn update_repository_remove_external_user(
        &self,
        dryrun: bool,
        name: &str,
        github_id: &str,
    ) -> Result<(), ExecutorError>;

    fn add_ruleset(&self, dryrun: bool, ruleset: &RuleSet) -> Result<(), ExecutorError>;
    fn update_ruleset(&self, dryrun: bool, ruleset: &RuleSet) -> Result<(), ExecutorError>;
    fn delete_ruleset(&self, dryrun: bool, id: u64) -> Result<(), ExecutorError>;

    fn begin(&self, dryrun: bool) -> Result<(), ExecutorError>;
    fn commit(&self, dryrun: bool) -> Result<(), ExecutorError>;
    fn rollback(&self, dryrun: bool, err: &EngineError) -> Result<(), ExecutorError>;
}

/// One operation forwarded to an executor, in audit-log vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RecordedOperation {
    AddUserToOrg { github_id: String },
    RemoveUserFromOrg { github_id: String },
    CreateTeam { slug: String, name: String, members: Vec<String> },
    UpdateTeamAddMember { team_slug: String, member_id: String, role: String },
    UpdateTeamRemoveMember { team_slug: String, member_id: String },
    DeleteTeam { team_slug: String },
    CreateRepository { name: String, writers: Vec<String>, readers: Vec<String>, public: bool },
    DeleteRepository { name: String },
    UpdateRepositoryUpdatePrivate { name: String, private: bool },
    UpdateRepositoryUpdateArchived { name: String, archived: bool },
    UpdateRepositoryAddTeamAccess { name: String, team_slug: String, permission: String },
    UpdateRepositoryUpdateTeamAccess { name: String, team_slug: String, permission: String },
    UpdateRepositoryRemoveTeamAccess { name: String, team_slug: String },
    UpdateRepositorySetExternalUser { name: String, github_id: String, permission: String },
    UpdateRepositoryRemoveExternalUser { name: String, github_id: String },
    AddRuleset { ruleset: RuleSet },
    UpdateRuleset { ruleset: RuleSet },
    DeleteRuleset { id: u64 },
    Begin,
    Commit,
    Rollback { error: String },
}

/// A recorded executor call with the dry-run flag it carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedCall {
    pub dryrun: bool,
    #[serde(flatten)]
    pub operation: RecordedOperation,
}

/// Executor that records every forwarded call instead of performing it.
///
/// Backs the plan output and lets tests assert the exact multiset of
/// emitted operations.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call forwarded so far, envelope included.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The mutating operations forwarded so far, envelope excluded.
    #[must_use]
    pub fn operations(&self) -> Vec<RecordedOperation> {
        self.calls()
            .into_iter()
            .map(|call| call.operation)
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

    fn record(&self, dryrun: bool, operation: RecordedOperation) -> Result<(), ExecutorError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall { dryrun, operation });
        Ok(())
    }
}

impl Executor for RecordingExecutor {
    fn add_user_to_org(&self, dryrun: bool, github_id: &str) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::AddUserToOrg { github_id: github_id.to_string() })
    }

    fn remove_user_from_org(&self, dryrun: bool, github_id: &str) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::RemoveUserFromOrg { github_id: github_id.to_string() },
        )
    }

    fn create_team(
        &self,
        dryrun: bool,
        slug: &str,
        name: &str,
        members: &[String],
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::CreateTeam {
                slug: slug.to_string(),
                name: name.to_string(),
                members: members.to_vec(),
            },
        )
    }

    fn update_team_add_member(
        &self,
        dryrun: bool,
        team_slug: &str,
        member_id: &str,
        role: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateTeamAddMember {
                team_slug: team_slug.to_string(),
                member_id: member_id.to_string(),
                role: role.to_string(),
            },
        )
    }

    fn update_team_remove_member(
        &self,
        dryrun: bool,
        team_slug: &str,
        member_id: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateTeamRemoveMember {
                team_slug: team_slug.to_string(),
                member_id: member_id.to_string(),
            },
        )
    }

    fn delete_team(&self, dryrun: bool, team_slug: &str) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::DeleteTeam { team_slug: team_slug.to_string() })
    }

    fn create_repository(
        &self,
        dryrun: bool,
        name: &str,
        _description: &str,
        writers: &[String],
        readers: &[String],
        public: bool,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::CreateRepository {
                name: name.to_string(),
                writers: writers.to_vec(),
                readers: readers.to_vec(),
                public,
            },
        )
    }

    fn delete_repository(&self, dryrun: bool, name: &str) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::DeleteRepository { name: name.to_string() })
    }

    fn update_repository_update_private(
        &self,
        dryrun: bool,
        name: &str,
        private: bool,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositoryUpdatePrivate { name: name.to_string(), private },
        )
    }

    fn update_repository_update_archived(
        &self,
        dryrun: bool,
        name: &str,
        archived: bool,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositoryUpdateArchived { name: name.to_string(), archived },
        )
    }

    fn update_repository_add_team_access(
        &self,
        dryrun: bool,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositoryAddTeamAccess {
                name: name.to_string(),
                team_slug: team_slug.to_string(),
                permission: permission.to_string(),
            },
        )
    }

    fn update_repository_update_team_access(
        &self,
        dryrun: bool,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositoryUpdateTeamAccess {
                name: name.to_string(),
                team_slug: team_slug.to_string(),
                permission: permission.to_string(),
            },
        )
    }

    fn update_repository_remove_team_access(
        &self,
        dryrun: bool,
        name: &str,
        team_slug: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositoryRemoveTeamAccess {
                name: name.to_string(),
                team_slug: team_slug.to_string(),
            },
        )
    }

    fn update_repository_set_external_user(
        &self,
        dryrun: bool,
        name: &str,
        github_id: &str,
        permission: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositorySetExternalUser {
                name: name.to_string(),
                github_id: github_id.to_string(),
                permission: permission.to_string(),
            },
        )
    }

    fn update_repository_remove_external_user(
        &self,
        dryrun: bool,
        name: &str,
        github_id: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            dryrun,
            RecordedOperation::UpdateRepositoryRemoveExternalUser {
                name: name.to_string(),
                github_id: github_id.to_string(),
            },
        )
    }

    fn add_ruleset(&self, dryrun: bool, ruleset: &RuleSet) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::AddRuleset { ruleset: ruleset.clone() })
    }

    fn update_ruleset(&self, dryrun: bool, ruleset: &RuleSet) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::UpdateRuleset { ruleset: ruleset.clone() })
    }

    fn delete_ruleset(&self, dryrun: bool, id: u64) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::DeleteRuleset { id })
    }

    fn begin(&self, dryrun: bool) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::Begin)
    }

    fn commit(&self, dryrun: bool) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::Commit)
    }

    fn rollback(&self, dryrun: bool, err: &EngineError) -> Result<(), ExecutorError> {
        self.record(dryrun, RecordedOperation::Rollback { error: err.to_string() })
    }
}
