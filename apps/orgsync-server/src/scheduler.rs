//! Apply scheduler: single-flight reconciliations with a one-slot lobby.
//!
//! At most one reconciliation runs at a time and at most one more waits.
//! A trigger arriving while the lobby is occupied is skipped; declared
//! state is re-read at the start of every run, so a queued run already
//! covers it. The periodic ticker, the webhook callback, and the REST
//! resync endpoint all funnel through [`ApplyScheduler::apply_and_record`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::service::SyncError;

/// Runs one reconciliation on behalf of the scheduler.
pub type ApplyFn = Box<dyn Fn(bool, &str) -> Result<(), SyncError> + Send + Sync>;

/// Receives a message when a run fails with a new error.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that emits a warning log line.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(message, "Reconciliation error changed");
    }
}

/// Outcome of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A reconciliation ran to completion.
    Applied,
    /// The lobby was already occupied; nothing ran.
    Skipped,
    /// A reconciliation ran and failed.
    Failed(String),
}

#[derive(Default)]
struct LobbyState {
    /// A reconciliation is running.
    current: bool,
    /// One more is queued behind it.
    lobby: bool,
}

/// Last-run bookkeeping exposed through the status endpoint.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    /// Seconds until the periodic ticker fires next.
    pub seconds_to_next_sync: i64,
}

/// Serializes reconciliations and tracks their outcomes.
pub struct ApplyScheduler {
    apply: ApplyFn,
    lobby: Mutex<LobbyState>,
    lobby_cond: Condvar,
    status: Mutex<SchedulerStatus>,
    notifier: Box<dyn Notifier>,
    apply_interval_secs: i64,
}

impl ApplyScheduler {
    pub fn new(apply: ApplyFn, notifier: Box<dyn Notifier>, apply_interval_secs: i64) -> Self {
        Self {
            apply,
            lobby: Mutex::new(LobbyState::default()),
            lobby_cond: Condvar::new(),
            // Zero means the first tick reconciles immediately.
            status: Mutex::new(SchedulerStatus::default()),
            notifier,
            apply_interval_secs,
        }
    }

    /// Trigger a reconciliation, record its outcome, and rearm the
    /// periodic interval.
    pub fn apply_and_record(&self, force: bool, author: &str) -> ApplyOutcome {
        let outcome = self.trigger_apply(force, author);
        match &outcome {
            ApplyOutcome::Skipped => {}
            ApplyOutcome::Applied => self.record_outcome(None),
            ApplyOutcome::Failed(message) => {
                tracing::error!(error = %message, "Reconciliation failed");
                self.record_outcome(Some(message.clone()));
            }
        }
        self.rearm_interval();
        outcome
    }

    /// Single-flight entry: run now, wait in the lobby, or skip.
    fn trigger_apply(&self, force: bool, author: &str) -> ApplyOutcome {
        {
            let mut state = self.lobby.lock().unwrap_or_else(PoisonError::into_inner);
            if state.lobby {
                return ApplyOutcome::Skipped;
            }
            if state.current {
                state.lobby = true;
                while state.lobby {
                    state = self
                        .lobby_cond
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            } else {
                state.current = true;
            }
        }

        let result = (self.apply)(force, author);

        // Hand the slot to the lobby waiter, or free it.
        {
            let mut state = self.lobby.lock().unwrap_or_else(PoisonError::into_inner);
            if state.lobby {
                state.lobby = false;
                self.lobby_cond.notify_one();
            } else {
                state.current = false;
            }
        }

        match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(err) => ApplyOutcome::Failed(err.to_string()),
        }
    }

    /// Periodic tick loop: once per second, decrement the interval
    /// counter and reconcile when it reaches zero. Returns when `stop` is
    /// set; an in-flight reconciliation finishes first.
    pub fn run_ticker(&self, stop: &AtomicBool) {
        tracing::info!(interval = self.apply_interval_secs, "Apply ticker started");
        while !stop.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_secs(1));
            let due = {
                let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
                status.seconds_to_next_sync -= 1;
                status.seconds_to_next_sync <= 0
            };
            if due {
                self.apply_and_record(false, "scheduler");
            }
        }
        tracing::info!("Apply ticker stopped");
    }

    /// Snapshot of the last-run bookkeeping.
    pub fn status(&self) -> SchedulerStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_outcome(&self, error: Option<String>) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.last_sync_time = Some(Utc::now());
        if let Some(message) = &error {
            // New-error alerting: notify on a changed message, not on
            // every failing run.
            if status.last_sync_error.as_deref() != Some(message.as_str()) {
                self.notifier.notify(message);
            }
        }
        status.last_sync_error = error;
    }

    fn rearm_interval(&self) {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seconds_to_next_sync = self.apply_interval_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct RecordingNotifier(Mutex<Vec<String>>);

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for Arc<RecordingNotifier> {
        fn notify(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn failing_apply(message: &'static str) -> ApplyFn {
        Box::new(move |_force, _author| {
            Err(SyncError::Source(SourceError::Read {
                path: message.into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }))
        })
    }

    #[test]
    fn test_single_flight_with_one_slot_lobby() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let apply: ApplyFn = {
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            Box::new(move |_force, _author| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(200));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        };

        let scheduler = Arc::new(ApplyScheduler::new(apply, Box::new(LogNotifier), 600));

        // Occupy the single-flight slot, then fire three more triggers
        // while it is held.
        let first = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.apply_and_record(false, "tests"))
        };
        thread::sleep(Duration::from_millis(50));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || scheduler.apply_and_record(false, "tests"))
            })
            .collect();

        let mut outcomes = vec![first.join().unwrap()];
        for handle in handles {
            outcomes.push(handle.join().unwrap());
        }

        let applied = outcomes.iter().filter(|o| **o == ApplyOutcome::Applied).count();
        let skipped = outcomes.iter().filter(|o| **o == ApplyOutcome::Skipped).count();
        assert_eq!(applied, 2, "one run plus one lobby follow-up");
        assert_eq!(skipped, 2, "everything beyond the lobby is skipped");
        assert_eq!(max_running.load(Ordering::SeqCst), 1, "no overlap");
    }

    #[test]
    fn test_notifies_only_when_the_error_changes() {
        let notifier = RecordingNotifier::new();
        let scheduler = ApplyScheduler::new(
            failing_apply("boom"),
            Box::new(Arc::clone(&notifier)),
            600,
        );

        scheduler.apply_and_record(false, "tests");
        scheduler.apply_and_record(false, "tests");

        assert_eq!(notifier.messages().len(), 1, "repeat failures stay quiet");
        assert!(notifier.messages()[0].contains("boom"));
        assert!(scheduler.status().last_sync_error.is_some());
    }

    #[test]
    fn test_success_clears_the_last_error() {
        let notifier = RecordingNotifier::new();
        let scheduler = ApplyScheduler::new(
            Box::new(|_force, _author| Ok(())),
            Box::new(Arc::clone(&notifier)),
            600,
        );

        scheduler.apply_and_record(false, "tests");

        let status = scheduler.status();
        assert!(status.last_sync_time.is_some());
        assert!(status.last_sync_error.is_none());
        assert_eq!(status.seconds_to_next_sync, 600);
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_skipped_runs_leave_no_outcome_trace() {
        let scheduler = Arc::new(ApplyScheduler::new(
            Box::new(|_force, _author| {
                thread::sleep(Duration::from_millis(150));
                Ok(())
            }),
            Box::new(LogNotifier),
            600,
        ));

        let first = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.apply_and_record(false, "tests"))
        };
        thread::sleep(Duration::from_millis(20));
        let second = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.apply_and_record(false, "tests"))
        };
        thread::sleep(Duration::from_millis(20));

        // Lobby occupied: this trigger is skipped synchronously.
        let outcome = scheduler.apply_and_record(false, "tests");
        assert_eq!(outcome, ApplyOutcome::Skipped);

        first.join().unwrap();
        second.join().unwrap();
    }
}
