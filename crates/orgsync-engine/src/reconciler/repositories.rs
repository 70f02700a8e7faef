//! Repositories pass: existence, flags, team access, collaborators.

use std::collections::BTreeMap;

use crate::context::ReconcileContext;
use crate::diff::{compare_entities, string_multiset_diff, DiffEvent};
use crate::error::EngineResult;
use crate::mirror::LiveMirror;
use crate::model::DeclaredOrg;
use crate::reconciler::Reconciler;
use crate::slug::slugify;

/// Comparable projection of a repository, shared by both sides of the
/// diff. Equality is flag equality plus multiset equality on the four
/// access lists.
#[derive(Debug, Default)]
struct RepoComparable {
    is_public: bool,
    is_archived: bool,
    /// Team slugs with write access.
    writers: Vec<String>,
    /// Team slugs with read access.
    readers: Vec<String>,
    /// Collaborator logins with read access.
    external_user_readers: Vec<String>,
    /// Collaborator logins with write access.
    external_user_writers: Vec<String>,
}

fn repos_match(declared: &RepoComparable, live: &RepoComparable) -> bool {
    declared.is_archived == live.is_archived
        && declared.is_public == live.is_public
        && string_multiset_diff(&declared.readers, &live.readers).0
        && string_multiset_diff(&declared.writers, &live.writers).0
        && string_multiset_diff(&declared.external_user_readers, &live.external_user_readers).0
        && string_multiset_diff(&declared.external_user_writers, &live.external_user_writers).0
}

impl Reconciler<'_> {
    /// Reconcile repositories and their access grants.
    ///
    /// `teams_repo` names the repository holding the declared state; every
    /// declared team's `-owners` variant is automatically added to its
    /// writers so owners can change their own teams.
    pub(super) fn reconcile_repositories(
        &self,
        ctx: &ReconcileContext,
        declared: &DeclaredOrg,
        mirror: &mut LiveMirror<'_>,
        teams_repo: &str,
        dryrun: bool,
    ) -> EngineResult<()> {
        // Live comparables: flags from the repository, team access split
        // by permission class, collaborators split by permission.
        let mut live_repos: BTreeMap<String, RepoComparable> = BTreeMap::new();
        for (name, repo) in mirror.repositories() {
            let mut comparable = RepoComparable {
                is_public: !repo.is_private,
                is_archived: repo.is_archived,
                ..RepoComparable::default()
            };
            for (github_id, permission) in &repo.external_users {
                if permission == "WRITE" {
                    comparable.external_user_writers.push(github_id.clone());
                } else {
                    comparable.external_user_readers.push(github_id.clone());
                }
            }
            live_repos.insert(name, comparable);
        }

        // The mirror reports team→repositories; the comparables need the
        // transposed view.
        for (team_slug, repos) in mirror.team_repositories() {
            for (repo_name, permission) in repos {
                if let Some(comparable) = live_repos.get_mut(&repo_name) {
                    if permission == "ADMIN" || permission == "WRITE" {
                        comparable.writers.push(team_slug.clone());
                    } else {
                        comparable.readers.push(team_slug.clone());
                    }
                }
            }
        }

        let mut declared_repos: BTreeMap<String, RepoComparable> = BTreeMap::new();
        for (repo_name, repo) in &declared.repositories {
            let mut writers: Vec<String> = repo.writers.iter().map(|w| slugify(w)).collect();
            if let Some(owner) = &repo.owner {
                writers.push(slugify(owner));
            }
            let mut readers: Vec<String> = repo.readers.iter().map(|r| slugify(r)).collect();

            if repo_name == teams_repo {
                for team_name in declared.teams.keys() {
                    writers.push(format!("{}-owners", slugify(team_name)));
                }
            }
            if self.config.everyone_team_enabled {
                readers.push("everyone".to_string());
            }

            let external_user_readers = resolve_collaborator_ids(declared, &repo.external_user_readers);
            let external_user_writers = resolve_collaborator_ids(declared, &repo.external_user_writers);

            declared_repos.insert(
                slugify(repo_name),
                RepoComparable {
                    is_public: repo.is_public,
                    is_archived: repo.archived,
                    writers,
                    readers,
                    external_user_readers,
                    external_user_writers,
                },
            );
        }

        compare_entities(&declared_repos, &live_repos, repos_match, |event| match event {
            DiffEvent::Added(name, repo) => self.create_repository(
                ctx,
                dryrun,
                mirror,
                name,
                name,
                &repo.writers,
                &repo.readers,
                repo.is_public,
            ),
            DiffEvent::Removed(name, _) => self.delete_repository(ctx, dryrun, mirror, name),
            DiffEvent::Changed(name, declared_repo, live_repo) => {
                self.converge_repository(ctx, dryrun, mirror, name, declared_repo, live_repo)
            }
        })
    }

    /// Emit the fixed-order update sequence for one diverging repository:
    /// visibility, archive flag, reader grants, writer grants, then
    /// collaborators.
    fn converge_repository(
        &self,
        ctx: &ReconcileContext,
        dryrun: bool,
        mirror: &mut LiveMirror<'_>,
        name: &str,
        declared: &RepoComparable,
        live: &RepoComparable,
    ) -> EngineResult<()> {
        if declared.is_public != live.is_public {
            self.update_repository_update_private(ctx, dryrun, mirror, name, !declared.is_public)?;
        }
        if declared.is_archived != live.is_archived {
            self.update_repository_update_archived(ctx, dryrun, mirror, name, declared.is_archived)?;
        }

        let (readers_equal, readers_to_add, readers_to_remove) =
            string_multiset_diff(&declared.readers, &live.readers);
        if !readers_equal {
            for team_slug in &readers_to_add {
                self.update_repository_add_team_access(ctx, dryrun, mirror, name, team_slug, "pull")?;
            }
            for team_slug in &readers_to_remove {
                self.update_repository_remove_team_access(ctx, dryrun, mirror, name, team_slug)?;
            }
        }

        let (writers_equal, writers_to_add, writers_to_remove) =
            string_multiset_diff(&declared.writers, &live.writers);
        if !writers_equal {
            for team_slug in &writers_to_add {
                self.update_repository_add_team_access(ctx, dryrun, mirror, name, team_slug, "push")?;
            }
            for team_slug in &writers_to_remove {
                self.update_repository_remove_team_access(ctx, dryrun, mirror, name, team_slug)?;
            }
        }

        let (ereaders_equal, ereaders_to_add, ereaders_to_remove) =
            string_multiset_diff(&declared.external_user_readers, &live.external_user_readers);
        let (ewriters_equal, ewriters_to_add, ewriters_to_remove) =
            string_multiset_diff(&declared.external_user_writers, &live.external_user_writers);

        if !ereaders_equal {
            for github_id in &ereaders_to_remove {
                // A reader being promoted to writer keeps its grant; the
                // upcoming set overwrites the permission instead.
                if !ewriters_to_add.contains(github_id) {
                    self.update_repository_remove_external_user(ctx, dryrun, mirror, name, github_id)?;
                }
            }
            for github_id in &ereaders_to_add {
                self.update_repository_set_external_user(ctx, dryrun, mirror, name, github_id, "pull")?;
            }
        }

        if !ewriters_equal {
            for github_id in &ewriters_to_remove {
                // Same cross-check for a writer demoted to reader.
                if !ereaders_to_add.contains(github_id) {
                    self.update_repository_remove_external_user(ctx, dryrun, mirror, name, github_id)?;
                }
            }
            for github_id in &ewriters_to_add {
                self.update_repository_set_external_user(ctx, dryrun, mirror, name, github_id, "push")?;
            }
        }

        Ok(())
    }
}

/// Translate external-user logical names to GitHub logins, dropping names
/// with no declared entry.
fn resolve_collaborator_ids(declared: &DeclaredOrg, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| {
            declared
                .external_users
                .get(name)
                .map(|user| user.github_id.clone())
        })
        .collect()
}
