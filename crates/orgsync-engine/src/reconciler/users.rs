//! Users pass: organization membership.

use crate::context::ReconcileContext;
use crate::error::EngineResult;
use crate::mirror::LiveMirror;
use crate::model::DeclaredOrg;
use crate::reconciler::Reconciler;

impl Reconciler<'_> {
    /// Reconcile organization membership by GitHub login.
    ///
    /// The declared→live lookup uses the declared user's `github_id`, not
    /// its logical name. Every live login no declared user maps to is
    /// removed (subject to the destructive-users gate).
    pub(super) fn reconcile_users(
        &self,
        ctx: &ReconcileContext,
        declared: &DeclaredOrg,
        mirror: &mut LiveMirror<'_>,
        dryrun: bool,
    ) -> EngineResult<()> {
        let mut unseen = mirror.users();

        for user in declared.users.values() {
            if !unseen.remove(&user.github_id) {
                self.add_user_to_org(ctx, dryrun, mirror, &user.github_id)?;
            }
        }

        for github_id in &unseen {
            self.remove_user_from_org(ctx, dryrun, mirror, github_id)?;
        }

        Ok(())
    }
}
