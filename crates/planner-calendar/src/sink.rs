//! Where per-calendar failures are reported.

use crate::error::RetrievalError;

pub trait FailureSink: Send + Sync {
    fn report(&self, message: &str, error: &RetrievalError);
}

/// Reports failures as `tracing` warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, message: &str, error: &RetrievalError) {
        tracing::warn!(
            calendar = %error.source_id,
            status = ?error.status,
            error = %error,
            "{}",
            message
        );
    }
}
