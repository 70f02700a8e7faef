//! Reconciliation mediator and transaction envelope.
//!
//! [`Reconciler`] drives one reconciliation: it wraps the live snapshot in
//! a [`LiveMirror`], runs the per-class passes in fixed order (users,
//! teams, repositories, then rulesets when the platform is enterprise) and
//! signals `begin`/`commit`/`rollback` to the executor.
//!
//! Every mutation goes through one mediator method that logs the intent
//! with actor attribution, updates the mirror so later passes observe the
//! change, and forwards to the executor unless the operation is gated by
//! policy. Destructive gating is asymmetric: a gated user removal still
//! logs and updates the mirror (only the remote call is withheld), while
//! gated team/repository/ruleset deletions are skipped entirely so the
//! un-issued delete never appears in the mirror.

mod repositories;
mod rulesets;
mod teams;
mod users;

use crate::config::OrgConfig;
use crate::context::ReconcileContext;
use crate::error::{EngineError, EngineResult};
use crate::executor::Executor;
use crate::mirror::LiveMirror;
use crate::model::{DeclaredOrg, LiveSnapshot, RuleSet};

/// Drives declared state onto live state.
pub struct Reconciler<'a> {
    executor: Option<&'a dyn Executor>,
    config: &'a OrgConfig,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler. Without an executor the engine runs
    /// mirror-only, which is what planning and tests use.
    #[must_use]
    pub fn new(executor: Option<&'a dyn Executor>, config: &'a OrgConfig) -> Self {
        Self { executor, config }
    }

    /// Run one reconciliation and return the post-reconcile live view.
    ///
    /// On success the returned snapshot replaces the cached one (the
    /// mirror's mutations become the new baseline). On the first pass
    /// error the executor receives a rollback signal and the error is
    /// returned; the remote may have applied earlier operations, and the
    /// next reconciliation re-diffs from fresh live state.
    pub fn reconcile(
        &self,
        ctx: &ReconcileContext,
        declared: &DeclaredOrg,
        live: &LiveSnapshot,
        teams_repo: &str,
        dryrun: bool,
    ) -> EngineResult<LiveSnapshot> {
        let mut mirror = LiveMirror::new(live);

        self.begin(dryrun)?;

        self.reconcile_users(ctx, declared, &mut mirror, dryrun)
            .map_err(|err| self.abort(dryrun, err))?;
        self.reconcile_teams(ctx, declared, &mut mirror, dryrun)
            .map_err(|err| self.abort(dryrun, err))?;
        self.reconcile_repositories(ctx, declared, &mut mirror, teams_repo, dryrun)
            .map_err(|err| self.abort(dryrun, err))?;
        if mirror.is_enterprise() {
            self.reconcile_rulesets(ctx, declared, &mirror, dryrun)
                .map_err(|err| self.abort(dryrun, err))?;
        }

        self.commit(dryrun)?;

        Ok(mirror.into_snapshot())
    }

    // ── Transaction envelope ───────────────────────────────────────────

    fn begin(&self, dryrun: bool) -> EngineResult<()> {
        tracing::debug!(dryrun, "reconciliation begin");
        if let Some(executor) = self.executor {
            executor.begin(dryrun)?;
        }
        Ok(())
    }

    fn commit(&self, dryrun: bool) -> EngineResult<()> {
        tracing::debug!(dryrun, "reconciliation commit");
        if let Some(executor) = self.executor {
            executor.commit(dryrun)?;
        }
        Ok(())
    }

    fn abort(&self, dryrun: bool, err: EngineError) -> EngineError {
        tracing::debug!(dryrun, error = %err, "reconciliation rollback");
        if let Some(executor) = self.executor {
            if let Err(rollback_err) = executor.rollback(dryrun, &err) {
                tracing::warn!(error = %rollback_err, "rollback signal failed");
            }
        }
        err
    }

    // ── Mutation mediator (one method per operation) ───────────────────

    pub fn add_user_to_org(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        github_id: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "add_user_to_org",
            github_id,
            "adding user to organization"
        );
        mirror.add_user_to_org(github_id);
        if let Some(executor) = self.executor {
            executor.add_user_to_org(dryrun, github_id)?;
        }
        Ok(())
    }

    /// Gated by `allow_destructive_users`: the log line and mirror update
    /// always happen, only the remote call is withheld.
    pub fn remove_user_from_org(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        github_id: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "remove_user_from_org",
            github_id,
            "removing user from organization"
        );
        mirror.remove_user_from_org(github_id);
        if let Some(executor) = self.executor {
            if self.config.destructive_operations.allow_destructive_users {
                executor.remove_user_from_org(dryrun, github_id)?;
            }
        }
        Ok(())
    }

    pub fn create_team(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        slug: &str,
        name: &str,
        members: &[String],
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "create_team",
            slug,
            members = %members.join(","),
            "creating team"
        );
        mirror.create_team(slug, name, members);
        if let Some(executor) = self.executor {
            executor.create_team(dryrun, slug, name, members)?;
        }
        Ok(())
    }

    /// The role is forced to `"member"` before both the mirror and the
    /// executor see it; callers currently never ask for anything else.
    pub fn update_team_add_member(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        team_slug: &str,
        member_id: &str,
        role: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_team_add_member",
            team_slug,
            member_id,
            role,
            "adding team member"
        );
        mirror.update_team_add_member(team_slug, member_id, "member");
        if let Some(executor) = self.executor {
            executor.update_team_add_member(dryrun, team_slug, member_id, "member")?;
        }
        Ok(())
    }

    pub fn update_team_remove_member(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        team_slug: &str,
        member_id: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_team_remove_member",
            team_slug,
            member_id,
            "removing team member"
        );
        mirror.update_team_remove_member(team_slug, member_id);
        if let Some(executor) = self.executor {
            executor.update_team_remove_member(dryrun, team_slug, member_id)?;
        }
        Ok(())
    }

    /// Gated by `allow_destructive_teams`; when gated, nothing happens:
    /// no log, no mirror update, no remote call.
    pub fn delete_team(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        team_slug: &str,
    ) -> EngineResult<()> {
        if !self.config.destructive_operations.allow_destructive_teams {
            return Ok(());
        }
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "delete_team",
            team_slug,
            "deleting team"
        );
        mirror.delete_team(team_slug);
        if let Some(executor) = self.executor {
            executor.delete_team(dryrun, team_slug)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_repository(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        description: &str,
        writers: &[String],
        readers: &[String],
        public: bool,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "create_repository",
            name,
            readers = %readers.join(","),
            writers = %writers.join(","),
            public,
            "creating repository"
        );
        mirror.create_repository(name, description, writers, readers, public);
        if let Some(executor) = self.executor {
            executor.create_repository(dryrun, name, description, writers, readers, public)?;
        }
        Ok(())
    }

    /// Gated by `allow_destructive_repositories`; when gated, nothing
    /// happens: no log, no mirror update, no remote call.
    pub fn delete_repository(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
    ) -> EngineResult<()> {
        if !self.config.destructive_operations.allow_destructive_repositories {
            return Ok(());
        }
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "delete_repository",
            name,
            "deleting repository"
        );
        mirror.delete_repository(name);
        if let Some(executor) = self.executor {
            executor.delete_repository(dryrun, name)?;
        }
        Ok(())
    }

    pub fn update_repository_update_private(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        private: bool,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_update_private",
            name,
            private,
            "updating repository visibility"
        );
        mirror.update_repository_update_private(name, private);
        if let Some(executor) = self.executor {
            executor.update_repository_update_private(dryrun, name, private)?;
        }
        Ok(())
    }

    pub fn update_repository_update_archived(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        archived: bool,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_update_archived",
            name,
            archived,
            "updating repository archive flag"
        );
        mirror.update_repository_update_archived(name, archived);
        if let Some(executor) = self.executor {
            executor.update_repository_update_archived(dryrun, name, archived)?;
        }
        Ok(())
    }

    pub fn update_repository_add_team_access(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_add_team",
            name,
            team_slug,
            permission,
            "granting team access"
        );
        mirror.update_repository_add_team_access(name, team_slug, permission);
        if let Some(executor) = self.executor {
            executor.update_repository_add_team_access(dryrun, name, team_slug, permission)?;
        }
        Ok(())
    }

    pub fn update_repository_update_team_access(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_update_team",
            name,
            team_slug,
            permission,
            "updating team access"
        );
        mirror.update_repository_update_team_access(name, team_slug, permission);
        if let Some(executor) = self.executor {
            executor.update_repository_update_team_access(dryrun, name, team_slug, permission)?;
        }
        Ok(())
    }

    pub fn update_repository_remove_team_access(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        team_slug: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_remove_team",
            name,
            team_slug,
            "revoking team access"
        );
        mirror.update_repository_remove_team_access(name, team_slug);
        if let Some(executor) = self.executor {
            executor.update_repository_remove_team_access(dryrun, name, team_slug)?;
        }
        Ok(())
    }

    pub fn update_repository_set_external_user(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        github_id: &str,
        permission: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_set_external_user",
            name,
            github_id,
            permission,
            "setting collaborator access"
        );
        mirror.update_repository_set_external_user(name, github_id, permission);
        if let Some(executor) = self.executor {
            executor.update_repository_set_external_user(dryrun, name, github_id, permission)?;
        }
        Ok(())
    }

    pub fn update_repository_remove_external_user(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        github_id: &str,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_repository_remove_external_user",
            name,
            github_id,
            "removing collaborator access"
        );
        mirror.update_repository_remove_external_user(name, github_id);
        if let Some(executor) = self.executor {
            executor.update_repository_remove_external_user(dryrun, name, github_id)?;
        }
        Ok(())
    }

    pub fn add_ruleset(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        ruleset: &RuleSet,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "add_ruleset",
            name = %ruleset.name,
            enforcement = %ruleset.enforcement,
            "adding ruleset"
        );
        if let Some(executor) = self.executor {
            executor.add_ruleset(dryrun, ruleset)?;
        }
        Ok(())
    }

    pub fn update_ruleset(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        ruleset: &RuleSet,
    ) -> EngineResult<()> {
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "update_ruleset",
            name = %ruleset.name,
            id = ruleset.id,
            enforcement = %ruleset.enforcement,
            "updating ruleset"
        );
        if let Some(executor) = self.executor {
            executor.update_ruleset(dryrun, ruleset)?;
        }
        Ok(())
    }

    /// Gated by `allow_destructive_rulesets`; when gated, nothing happens.
    pub fn delete_ruleset(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        id: u64,
    ) -> EngineResult<()> {
        if !self.config.destructive_operations.allow_destructive_rulesets {
            return Ok(());
        }
        tracing::info!(
            dryrun,
            author = ctx.author(),
            command = "delete_ruleset",
            id,
            "deleting ruleset"
        );
        if let Some(executor) = self.executor {
            executor.delete_ruleset(dryrun, id)?;
        }
        Ok(())
    }
}
