use async_trait::async_trait;
use std::time::Duration;

use super::context::{OperationKind, SubmissionContext};
use super::SubmitError;

/// Ordered phases of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    DataPreparation = 0, // Load category, rules, school path and existing entry
    Security = 1,        // Permission and status transition checks
    InputValidation = 2, // Schema validation of submitted data
    Enrichment = 3,      // Sanitization and record construction
    Database = 4,        // The single backend write plus its version row
    Notification = 5,    // Realtime events and notifications (after commit)
}

impl ObserverRing {
    pub const ORDER: [ObserverRing; 6] = [
        ObserverRing::DataPreparation,
        ObserverRing::Security,
        ObserverRing::InputValidation,
        ObserverRing::Enrichment,
        ObserverRing::Database,
        ObserverRing::Notification,
    ];

    /// Rings after the write; their failures are logged, not returned
    pub fn is_post_commit(&self) -> bool {
        *self > ObserverRing::Database
    }
}

#[async_trait]
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to(&self, _op: OperationKind) -> bool {
        true
    }

    /// Execution timeout
    fn timeout(&self) -> Duration {
        Duration::from_millis(crate::config::config().forms.observer_timeout_ms)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError>;
}
