//! Teams pass: teams, `-owners` siblings, and memberships.

use std::collections::{BTreeMap, BTreeSet};

use crate::context::ReconcileContext;
use crate::diff::{compare_entities, string_multiset_diff, DiffEvent};
use crate::error::EngineResult;
use crate::mirror::LiveMirror;
use crate::model::{DeclaredOrg, LiveTeam};
use crate::reconciler::Reconciler;
use crate::slug::slugify;

impl Reconciler<'_> {
    /// Reconcile teams and team memberships.
    ///
    /// Each declared team induces two entries: `slug(team)` with
    /// members ∪ owners and `slug(team)-owners` with the owners only. When
    /// the `everyone` team is enabled, a synthetic entry carrying every
    /// declared user is added. Member names are translated to GitHub
    /// logins through the declared user table inside the callbacks;
    /// names that resolve to no declared user are dropped.
    pub(super) fn reconcile_teams(
        &self,
        ctx: &ReconcileContext,
        declared: &DeclaredOrg,
        mirror: &mut LiveMirror<'_>,
        dryrun: bool,
    ) -> EngineResult<()> {
        let live_teams = mirror.teams();

        let mut declared_teams: BTreeMap<String, LiveTeam> = BTreeMap::new();
        for (team_name, team) in &declared.teams {
            let mut members = team.members.clone();
            members.extend(team.owners.iter().cloned());

            let team_slug = slugify(team_name);
            declared_teams.insert(
                team_slug.clone(),
                LiveTeam {
                    name: team_name.clone(),
                    slug: team_slug.clone(),
                    members,
                },
            );

            let owners_slug = format!("{team_slug}-owners");
            declared_teams.insert(
                owners_slug.clone(),
                LiveTeam {
                    name: format!("{team_name}-owners"),
                    slug: owners_slug,
                    members: team.owners.clone(),
                },
            );
        }

        if self.config.everyone_team_enabled {
            declared_teams.insert(
                "everyone".to_string(),
                LiveTeam {
                    name: "everyone".to_string(),
                    slug: "everyone".to_string(),
                    members: declared.users.keys().cloned().collect(),
                },
            );
        }

        let members_match = |declared_team: &LiveTeam, live_team: &LiveTeam| {
            let (equal, _, _) =
                string_multiset_diff(&declared_team.members, &live_team.members);
            equal
        };

        compare_entities(&declared_teams, &live_teams, members_match, |event| {
            match event {
                DiffEvent::Added(_, team) => {
                    let members = resolve_member_ids(declared, &team.members);
                    self.create_team(ctx, dryrun, mirror, &team.slug, &team.name, &members)
                }
                DiffEvent::Removed(_, live_team) => {
                    self.delete_team(ctx, dryrun, mirror, &live_team.slug)
                }
                DiffEvent::Changed(team_slug, declared_team, live_team) => {
                    let mut declared_ids: BTreeSet<String> =
                        resolve_member_ids(declared, &declared_team.members)
                            .into_iter()
                            .collect();

                    for member_id in &live_team.members {
                        if !declared_ids.remove(member_id) {
                            self.update_team_remove_member(
                                ctx, dryrun, mirror, team_slug, member_id,
                            )?;
                        }
                    }
                    for member_id in &declared_ids {
                        self.update_team_add_member(
                            ctx, dryrun, mirror, team_slug, member_id, "member",
                        )?;
                    }
                    Ok(())
                }
            }
        })
    }
}

/// Translate declared member names to GitHub logins, dropping names with
/// no declared user entry.
fn resolve_member_ids(declared: &DeclaredOrg, members: &[String]) -> Vec<String> {
    members
        .iter()
        .filter_map(|name| declared.users.get(name).map(|user| user.github_id.clone()))
        .collect()
}
