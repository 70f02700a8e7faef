//! Sync service: one reconciliation end to end.
//!
//! Loads a fresh declared state, obtains a live snapshot (cached across
//! reconciliations), runs the engine, and swaps the cache on success. The
//! last loaded declared state backs the read-only REST projections and
//! the readiness probe.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;

use orgsync_engine::{
    DeclaredOrg, EngineError, Executor, LiveSnapshot, ReconcileContext, Reconciler,
};

use crate::source::{DeclaredSource, LiveSource, SourceError};

/// Errors surfaced by one apply run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Declared or live state could not be loaded.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The engine aborted the reconciliation.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Owns the state sources, the live-snapshot cache, and the executor.
pub struct SyncService {
    source: Box<dyn DeclaredSource>,
    live: Box<dyn LiveSource>,
    executor: Option<Arc<dyn Executor + Send + Sync>>,
    teams_repo: String,
    dryrun: bool,
    cache: Mutex<Option<LiveSnapshot>>,
    declared: RwLock<Option<Arc<DeclaredOrg>>>,
}

impl SyncService {
    pub fn new(
        source: Box<dyn DeclaredSource>,
        live: Box<dyn LiveSource>,
        executor: Option<Arc<dyn Executor + Send + Sync>>,
        teams_repo: impl Into<String>,
        dryrun: bool,
    ) -> Self {
        Self {
            source,
            live,
            executor,
            teams_repo: teams_repo.into(),
            dryrun,
            cache: Mutex::new(None),
            declared: RwLock::new(None),
        }
    }

    /// Run one reconciliation.
    ///
    /// `force` drops the cached live snapshot first. On a successful
    /// non-dry-run apply the mirror's post-reconcile view becomes the new
    /// cached snapshot.
    pub fn apply(&self, force: bool, author: &str) -> Result<(), SyncError> {
        let bundle = self.source.load()?;
        let declared = Arc::new(bundle.org);
        *self
            .declared
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&declared));

        let snapshot = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if force {
                *cache = None;
            }
            match cache.as_ref() {
                Some(snapshot) => snapshot.clone(),
                None => {
                    let fresh = self.live.fetch()?;
                    *cache = Some(fresh.clone());
                    fresh
                }
            }
        };

        let ctx = ReconcileContext::with_author(author);
        let executor: Option<&dyn Executor> = match &self.executor {
            Some(executor) => Some(executor.as_ref()),
            None => None,
        };
        let reconciler = Reconciler::new(executor, &bundle.config);
        let next = reconciler.reconcile(&ctx, &declared, &snapshot, &self.teams_repo, self.dryrun)?;

        if !self.dryrun {
            *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(next);
        }

        Ok(())
    }

    /// Drop the cached live snapshot; the next apply refetches.
    pub fn flush_cache(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("Live-state cache flushed");
    }

    /// The declared state from the most recent load, if any.
    pub fn declared(&self) -> Option<Arc<DeclaredOrg>> {
        self.declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a declared state has been loaded at least once.
    pub fn is_ready(&self) -> bool {
        self.declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceBundle;
    use orgsync_engine::{DeclaredUser, RecordedOperation, RecordingExecutor};

    struct StaticDeclared(SourceBundle);

    impl DeclaredSource for StaticDeclared {
        fn load(&self) -> Result<SourceBundle, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct StaticLive(LiveSnapshot);

    impl LiveSource for StaticLive {
        fn fetch(&self) -> Result<LiveSnapshot, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn bundle_with_user(name: &str, github_id: &str) -> SourceBundle {
        let mut bundle = SourceBundle::default();
        bundle
            .org
            .users
            .insert(name.to_string(), DeclaredUser { github_id: github_id.to_string() });
        bundle
    }

    fn service_with(
        bundle: SourceBundle,
        executor: Option<Arc<dyn Executor + Send + Sync>>,
        dryrun: bool,
    ) -> SyncService {
        SyncService::new(
            Box::new(StaticDeclared(bundle)),
            Box::new(StaticLive(LiveSnapshot::default())),
            executor,
            "teams",
            dryrun,
        )
    }

    #[test]
    fn test_apply_publishes_declared_state() {
        let service = service_with(bundle_with_user("alice", "ghAlice"), None, false);
        assert!(!service.is_ready());

        service.apply(false, "tests").unwrap();

        assert!(service.is_ready());
        let declared = service.declared().unwrap();
        assert_eq!(declared.users["alice"].github_id, "ghAlice");
    }

    #[test]
    fn test_successful_apply_updates_the_cached_snapshot() {
        let recorder = Arc::new(RecordingExecutor::new());
        let service = service_with(
            bundle_with_user("alice", "ghAlice"),
            Some(recorder.clone()),
            false,
        );

        service.apply(false, "tests").unwrap();
        assert_eq!(
            recorder.operations(),
            vec![RecordedOperation::AddUserToOrg { github_id: "ghAlice".to_string() }]
        );

        // The mirror's view replaced the cache: a second apply sees the
        // user as already present and emits nothing new.
        service.apply(false, "tests").unwrap();
        assert_eq!(recorder.operations().len(), 1);
    }

    #[test]
    fn test_dry_run_does_not_touch_the_cache() {
        let recorder = Arc::new(RecordingExecutor::new());
        let service = service_with(
            bundle_with_user("alice", "ghAlice"),
            Some(recorder.clone()),
            true,
        );

        service.apply(false, "tests").unwrap();
        service.apply(false, "tests").unwrap();

        // Both dry runs diff against the same pristine snapshot.
        assert_eq!(
            recorder.operations(),
            vec![
                RecordedOperation::AddUserToOrg { github_id: "ghAlice".to_string() },
                RecordedOperation::AddUserToOrg { github_id: "ghAlice".to_string() },
            ]
        );
        assert!(recorder.calls().iter().all(|call| call.dryrun));
    }

    #[test]
    fn test_flush_cache_forces_a_refetch() {
        let recorder = Arc::new(RecordingExecutor::new());
        let service = service_with(
            bundle_with_user("alice", "ghAlice"),
            Some(recorder.clone()),
            false,
        );

        service.apply(false, "tests").unwrap();
        service.flush_cache();
        service.apply(false, "tests").unwrap();

        // After the flush the live source reports the pristine state
        // again, so the same addition is proposed a second time.
        assert_eq!(recorder.operations().len(), 2);
    }
}
