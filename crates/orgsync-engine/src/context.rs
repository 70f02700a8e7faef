//! Audit context threaded through a reconciliation.

/// Carries the actor identity attached to every operation log line.
///
/// The engine never inspects the context for cancellation; a
/// reconciliation runs to completion or until a pass fails.
#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    author: Option<String>,
}

impl ReconcileContext {
    /// Context without an author; log lines attribute `"unknown"`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context attributing operations to the given author.
    #[must_use]
    pub fn with_author(author: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
        }
    }

    /// The audit author, defaulting to `"unknown"`.
    #[must_use]
    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or("unknown")
    }
}
