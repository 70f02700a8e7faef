//! Mutable mirror over the read-only live snapshot.
//!
//! The mirror records every mutation issued during a reconciliation in
//! overlay maps, so that later diffs within the same run observe the
//! post-mutation world: a team created in the teams pass is visible when
//! the repositories pass resolves it as a writer. The underlying snapshot
//! is never copied up front; merged views are materialized on read.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{LiveRepo, LiveSnapshot, LiveTeam, RuleSet};

/// Overlay of recorded mutations on top of a live snapshot.
pub struct LiveMirror<'a> {
    base: &'a LiveSnapshot,
    users_added: BTreeSet<String>,
    users_removed: BTreeSet<String>,
    /// Team upserts (`Some`) and deletions (`None`) by slug.
    teams: BTreeMap<String, Option<LiveTeam>>,
    /// Repository upserts (`Some`) and deletions (`None`) by name.
    repositories: BTreeMap<String, Option<LiveRepo>>,
    /// Access upserts (`Some(permission)`) and revocations (`None`)
    /// by `(team slug, repository name)`.
    team_access: BTreeMap<(String, String), Option<String>>,
}

impl<'a> LiveMirror<'a> {
    /// Wrap a live snapshot; reads reflect the snapshot until the first
    /// mutation.
    #[must_use]
    pub fn new(base: &'a LiveSnapshot) -> Self {
        Self {
            base,
            users_added: BTreeSet::new(),
            users_removed: BTreeSet::new(),
            teams: BTreeMap::new(),
            repositories: BTreeMap::new(),
            team_access: BTreeMap::new(),
        }
    }

    /// Whether the platform advertises enterprise capability.
    #[must_use]
    pub fn is_enterprise(&self) -> bool {
        self.base.is_enterprise
    }

    // ── Read accessors (base merged with the overlay) ──────────────────

    /// Organization member logins.
    #[must_use]
    pub fn users(&self) -> BTreeSet<String> {
        let mut users = self.base.users.clone();
        for login in &self.users_removed {
            users.remove(login);
        }
        for login in &self.users_added {
            users.insert(login.clone());
        }
        users
    }

    /// Teams by slug.
    #[must_use]
    pub fn teams(&self) -> BTreeMap<String, LiveTeam> {
        let mut teams = self.base.teams.clone();
        for (slug, entry) in &self.teams {
            match entry {
                Some(team) => {
                    teams.insert(slug.clone(), team.clone());
                }
                None => {
                    teams.remove(slug);
                }
            }
        }
        teams
    }

    /// Repositories by name.
    #[must_use]
    pub fn repositories(&self) -> BTreeMap<String, LiveRepo> {
        let mut repositories = self.base.repositories.clone();
        for (name, entry) in &self.repositories {
            match entry {
                Some(repo) => {
                    repositories.insert(name.clone(), repo.clone());
                }
                None => {
                    repositories.remove(name);
                }
            }
        }
        repositories
    }

    /// Team slug to repository name to platform permission. Access rows
    /// for repositories deleted in the overlay are dropped.
    #[must_use]
    pub fn team_repositories(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut map = self.base.team_repositories.clone();
        for ((team_slug, repo_name), entry) in &self.team_access {
            match entry {
                Some(permission) => {
                    map.entry(team_slug.clone())
                        .or_default()
                        .insert(repo_name.clone(), permission.clone());
                }
                None => {
                    if let Some(repos) = map.get_mut(team_slug) {
                        repos.remove(repo_name);
                    }
                }
            }
        }

        let repositories = self.repositories();
        for repos in map.values_mut() {
            repos.retain(|name, _| repositories.contains_key(name));
        }
        map
    }

    /// Rulesets by name. Ruleset operations bypass the mirror, so this is
    /// always the snapshot's view.
    #[must_use]
    pub fn rule_sets(&self) -> &BTreeMap<String, RuleSet> {
        &self.base.rule_sets
    }

    // ── Mutators (one per executor operation) ──────────────────────────

    pub fn add_user_to_org(&mut self, github_id: &str) {
        self.users_removed.remove(github_id);
        self.users_added.insert(github_id.to_string());
    }

    pub fn remove_user_from_org(&mut self, github_id: &str) {
        self.users_added.remove(github_id);
        self.users_removed.insert(github_id.to_string());
    }

    pub fn create_team(&mut self, slug: &str, name: &str, members: &[String]) {
        self.teams.insert(
            slug.to_string(),
            Some(LiveTeam {
                name: name.to_string(),
                slug: slug.to_string(),
                members: members.to_vec(),
            }),
        );
    }

    pub fn delete_team(&mut self, slug: &str) {
        self.teams.insert(slug.to_string(), None);
    }

    pub fn update_team_add_member(&mut self, slug: &str, member_id: &str, _role: &str) {
        if let Some(mut team) = self.lookup_team(slug) {
            if !team.members.iter().any(|m| m == member_id) {
                team.members.push(member_id.to_string());
            }
            self.teams.insert(slug.to_string(), Some(team));
        }
    }

    pub fn update_team_remove_member(&mut self, slug: &str, member_id: &str) {
        if let Some(mut team) = self.lookup_team(slug) {
            team.members.retain(|m| m != member_id);
            self.teams.insert(slug.to_string(), Some(team));
        }
    }

    pub fn create_repository(
        &mut self,
        name: &str,
        _description: &str,
        writers: &[String],
        readers: &[String],
        public: bool,
    ) {
        self.repositories.insert(
            name.to_string(),
            Some(LiveRepo {
                is_private: !public,
                is_archived: false,
                external_users: BTreeMap::new(),
            }),
        );
        for team_slug in writers {
            self.team_access
                .insert((team_slug.clone(), name.to_string()), Some("WRITE".to_string()));
        }
        for team_slug in readers {
            self.team_access
                .insert((team_slug.clone(), name.to_string()), Some("READ".to_string()));
        }
    }

    pub fn delete_repository(&mut self, name: &str) {
        self.repositories.insert(name.to_string(), None);
    }

    pub fn update_repository_update_private(&mut self, name: &str, private: bool) {
        if let Some(mut repo) = self.lookup_repository(name) {
            repo.is_private = private;
            self.repositories.insert(name.to_string(), Some(repo));
        }
    }

    pub fn update_repository_update_archived(&mut self, name: &str, archived: bool) {
        if let Some(mut repo) = self.lookup_repository(name) {
            repo.is_archived = archived;
            self.repositories.insert(name.to_string(), Some(repo));
        }
    }

    pub fn update_repository_add_team_access(&mut self, name: &str, team_slug: &str, permission: &str) {
        self.team_access.insert(
            (team_slug.to_string(), name.to_string()),
            Some(platform_permission(permission)),
        );
    }

    pub fn update_repository_update_team_access(
        &mut self,
        name: &str,
        team_slug: &str,
        permission: &str,
    ) {
        self.team_access.insert(
            (team_slug.to_string(), name.to_string()),
            Some(platform_permission(permission)),
        );
    }

    pub fn update_repository_remove_team_access(&mut self, name: &str, team_slug: &str) {
        self.team_access
            .insert((team_slug.to_string(), name.to_string()), None);
    }

    pub fn update_repository_set_external_user(
        &mut self,
        name: &str,
        github_id: &str,
        permission: &str,
    ) {
        if let Some(mut repo) = self.lookup_repository(name) {
            repo.external_users
                .insert(github_id.to_string(), platform_permission(permission));
            self.repositories.insert(name.to_string(), Some(repo));
        }
    }

    pub fn update_repository_remove_external_user(&mut self, name: &str, github_id: &str) {
        if let Some(mut repo) = self.lookup_repository(name) {
            repo.external_users.remove(github_id);
            self.repositories.insert(name.to_string(), Some(repo));
        }
    }

    /// Materialize base plus overlay into a fresh snapshot; after a
    /// successful mutating reconciliation this replaces the cached one.
    #[must_use]
    pub fn into_snapshot(self) -> LiveSnapshot {
        LiveSnapshot {
            users: self.users(),
            teams: self.teams(),
            repositories: self.repositories(),
            team_repositories: self.team_repositories(),
            rule_sets: self.base.rule_sets.clone(),
            is_enterprise: self.base.is_enterprise,
        }
    }

    fn lookup_team(&self, slug: &str) -> Option<LiveTeam> {
        match self.teams.get(slug) {
            Some(entry) => entry.clone(),
            None => self.base.teams.get(slug).cloned(),
        }
    }

    fn lookup_repository(&self, name: &str) -> Option<LiveRepo> {
        match self.repositories.get(name) {
            Some(entry) => entry.clone(),
            None => self.base.repositories.get(name).cloned(),
        }
    }
}

/// Translate the engine permission vocabulary (`pull`/`push`) to the
/// platform's (`READ`/`WRITE`).
fn platform_permission(permission: &str) -> String {
    if permission == "push" {
        "WRITE".to_string()
    } else {
        "READ".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> LiveSnapshot {
        let mut snapshot = LiveSnapshot::default();
        snapshot.users.insert("ghAlice".to_string());
        snapshot.teams.insert(
            "platform".to_string(),
            LiveTeam {
                name: "Platform".to_string(),
                slug: "platform".to_string(),
                members: vec!["ghAlice".to_string()],
            },
        );
        snapshot.repositories.insert(
            "svc-api".to_string(),
            LiveRepo {
                is_private: true,
                is_archived: false,
                external_users: BTreeMap::from([("ghCarol".to_string(), "READ".to_string())]),
            },
        );
        snapshot.team_repositories.insert(
            "platform".to_string(),
            BTreeMap::from([("svc-api".to_string(), "WRITE".to_string())]),
        );
        snapshot
    }

    #[test]
    fn test_reads_pass_through_until_mutated() {
        let base = snapshot();
        let mirror = LiveMirror::new(&base);
        assert_eq!(mirror.users(), base.users);
        assert_eq!(mirror.teams(), base.teams);
        assert_eq!(mirror.repositories(), base.repositories);
        assert_eq!(mirror.team_repositories(), base.team_repositories);
    }

    #[test]
    fn test_user_add_and_remove() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.add_user_to_org("ghBob");
        assert!(mirror.users().contains("ghBob"));

        mirror.remove_user_from_org("ghAlice");
        assert!(!mirror.users().contains("ghAlice"));

        // Re-adding a removed user wins.
        mirror.add_user_to_org("ghAlice");
        assert!(mirror.users().contains("ghAlice"));

        // The base snapshot is untouched.
        assert!(base.users.contains("ghAlice"));
        assert!(!base.users.contains("ghBob"));
    }

    #[test]
    fn test_created_team_is_visible() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.create_team("sre", "SRE", &["ghBob".to_string()]);
        let teams = mirror.teams();
        assert_eq!(teams["sre"].members, vec!["ghBob".to_string()]);
    }

    #[test]
    fn test_deleted_team_disappears() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.delete_team("platform");
        assert!(!mirror.teams().contains_key("platform"));
    }

    #[test]
    fn test_team_membership_edits() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.update_team_add_member("platform", "ghBob", "member");
        mirror.update_team_remove_member("platform", "ghAlice");
        assert_eq!(mirror.teams()["platform"].members, vec!["ghBob".to_string()]);

        // Adding twice keeps a single entry.
        mirror.update_team_add_member("platform", "ghBob", "member");
        assert_eq!(mirror.teams()["platform"].members, vec!["ghBob".to_string()]);
    }

    #[test]
    fn test_membership_edit_on_unknown_team_is_ignored() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.update_team_add_member("ghost", "ghBob", "member");
        assert!(!mirror.teams().contains_key("ghost"));
    }

    #[test]
    fn test_create_repository_seeds_access() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.create_repository(
            "svc-new",
            "svc-new",
            &["platform".to_string()],
            &["sre".to_string()],
            true,
        );

        let repo = &mirror.repositories()["svc-new"];
        assert!(!repo.is_private);
        assert!(!repo.is_archived);

        let accesses = mirror.team_repositories();
        assert_eq!(accesses["platform"]["svc-new"], "WRITE");
        assert_eq!(accesses["sre"]["svc-new"], "READ");
    }

    #[test]
    fn test_deleted_repository_drops_access_rows() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.delete_repository("svc-api");
        assert!(!mirror.repositories().contains_key("svc-api"));
        assert!(!mirror.team_repositories()["platform"].contains_key("svc-api"));
    }

    #[test]
    fn test_repository_flag_updates() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.update_repository_update_private("svc-api", false);
        mirror.update_repository_update_archived("svc-api", true);

        let repo = &mirror.repositories()["svc-api"];
        assert!(!repo.is_private);
        assert!(repo.is_archived);
    }

    #[test]
    fn test_team_access_translation() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.update_repository_add_team_access("svc-api", "sre", "pull");
        assert_eq!(mirror.team_repositories()["sre"]["svc-api"], "READ");

        mirror.update_repository_update_team_access("svc-api", "sre", "push");
        assert_eq!(mirror.team_repositories()["sre"]["svc-api"], "WRITE");

        mirror.update_repository_remove_team_access("svc-api", "sre");
        assert!(!mirror
            .team_repositories()
            .get("sre")
            .is_some_and(|repos| repos.contains_key("svc-api")));
    }

    #[test]
    fn test_external_user_edits() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.update_repository_set_external_user("svc-api", "ghCarol", "push");
        assert_eq!(
            mirror.repositories()["svc-api"].external_users["ghCarol"],
            "WRITE"
        );

        mirror.update_repository_remove_external_user("svc-api", "ghCarol");
        assert!(!mirror.repositories()["svc-api"]
            .external_users
            .contains_key("ghCarol"));
    }

    #[test]
    fn test_into_snapshot_materializes_overlay() {
        let base = snapshot();
        let mut mirror = LiveMirror::new(&base);

        mirror.add_user_to_org("ghBob");
        mirror.create_team("sre", "SRE", &["ghBob".to_string()]);
        mirror.update_repository_update_private("svc-api", false);

        let next = mirror.into_snapshot();
        assert!(next.users.contains("ghBob"));
        assert!(next.teams.contains_key("sre"));
        assert!(!next.repositories["svc-api"].is_private);

        // Untouched corners carry over.
        assert!(next.users.contains("ghAlice"));
        assert_eq!(next.team_repositories["platform"]["svc-api"], "WRITE");
    }
}
