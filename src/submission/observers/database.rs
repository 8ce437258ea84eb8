// Ring 4: one atomic write of the entry together with its version row
use async_trait::async_trait;

use crate::models::FormEntryVersion;
use crate::submission::context::SubmissionContext;
use crate::submission::traits::{Observer, ObserverRing};
use crate::submission::SubmitError;

pub struct FormWriterObserver;

#[async_trait]
impl Observer for FormWriterObserver {
    fn name(&self) -> &'static str {
        "FormWriterObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let record = ctx.record()?.clone();

        let version = FormEntryVersion::snapshot(&record, ctx.actor_user_id());
        let expected = ctx.existing.as_ref().map(|e| e.version);
        let saved = ctx.store.save_form(record, version, expected).await?;

        // The caller went away while the write was in flight; do not hand the result on
        if ctx.cancel.is_cancelled() {
            return Err(SubmitError::Cancelled);
        }

        ctx.result = Some(saved);
        Ok(())
    }
}
