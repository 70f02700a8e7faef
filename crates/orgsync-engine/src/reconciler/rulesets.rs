//! Rulesets pass: organization-wide rulesets (enterprise only).

use std::collections::BTreeMap;

use regex::Regex;

use crate::context::ReconcileContext;
use crate::diff::{compare_entities, string_multiset_diff, DiffEvent};
use crate::error::{EngineError, EngineResult};
use crate::mirror::LiveMirror;
use crate::model::{DeclaredOrg, RuleSet};
use crate::reconciler::Reconciler;
use crate::slug::slugify;

fn rulesets_match(declared: &RuleSet, live: &RuleSet) -> bool {
    declared.enforcement == live.enforcement
        && declared.bypass_apps == live.bypass_apps
        && string_multiset_diff(&declared.on_include, &live.on_include).0
        && string_multiset_diff(&declared.on_exclude, &live.on_exclude).0
        && declared.rules == live.rules
        && string_multiset_diff(&declared.repositories, &live.repositories).0
}

impl Reconciler<'_> {
    /// Reconcile organization rulesets against the configured bindings.
    ///
    /// Each binding materializes one declared comparable: the named
    /// ruleset's payload plus the slugs of the declared repositories its
    /// pattern matches. An invalid pattern or a binding naming an
    /// undefined ruleset fails the pass before any diffing happens.
    pub(super) fn reconcile_rulesets(
        &self,
        ctx: &ReconcileContext,
        declared: &DeclaredOrg,
        mirror: &LiveMirror<'_>,
        dryrun: bool,
    ) -> EngineResult<()> {
        let mut declared_rulesets: BTreeMap<String, RuleSet> = BTreeMap::new();

        for binding in &self.config.rulesets {
            let pattern = Regex::new(&binding.pattern).map_err(|source| {
                EngineError::RulesetPattern {
                    pattern: binding.pattern.clone(),
                    source,
                }
            })?;
            let ruleset = declared.rulesets.get(&binding.ruleset).ok_or_else(|| {
                EngineError::UnknownRuleset {
                    name: binding.ruleset.clone(),
                }
            })?;

            let mut comparable = RuleSet {
                id: None,
                name: ruleset.name.clone(),
                enforcement: ruleset.enforcement,
                bypass_apps: ruleset
                    .bypass_apps
                    .iter()
                    .map(|bypass| (bypass.app_name.clone(), bypass.mode.clone()))
                    .collect(),
                on_include: ruleset.on.include.clone(),
                on_exclude: ruleset.on.exclude.clone(),
                rules: ruleset
                    .rules
                    .iter()
                    .map(|rule| (rule.ruletype.clone(), rule.parameters.clone()))
                    .collect(),
                repositories: Vec::new(),
            };
            for repo_name in declared.repositories.keys() {
                let repo_slug = slugify(repo_name);
                if pattern.is_match(&repo_slug) {
                    comparable.repositories.push(repo_slug);
                }
            }

            declared_rulesets.insert(ruleset.name.clone(), comparable);
        }

        let live_rulesets = mirror.rule_sets();

        compare_entities(&declared_rulesets, live_rulesets, rulesets_match, |event| {
            match event {
                DiffEvent::Added(_, ruleset) => self.add_ruleset(ctx, dryrun, ruleset),
                DiffEvent::Removed(_, live_ruleset) => {
                    self.delete_ruleset(ctx, dryrun, live_ruleset.id.unwrap_or_default())
                }
                DiffEvent::Changed(_, declared_ruleset, live_ruleset) => {
                    let mut payload = declared_ruleset.clone();
                    payload.id = live_ruleset.id;
                    self.update_ruleset(ctx, dryrun, &payload)
                }
            }
        })
    }
}
