// Ring 3: sanitize validated data and build the record to persist
use async_trait::async_trait;
use chrono::Utc;

use crate::models::FormData;
use crate::sanitize::{sanitize_form, FieldSanitizeOptions};
use crate::submission::context::{Operation, SubmissionContext};
use crate::submission::state::{after_edit, after_review};
use crate::submission::traits::{Observer, ObserverRing};
use crate::submission::SubmitError;
use crate::types::FormStatus;

pub struct RecordBuilderObserver;

#[async_trait]
impl Observer for RecordBuilderObserver {
    fn name(&self) -> &'static str {
        "RecordBuilderObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let now = Utc::now();
        let record = match &ctx.operation {
            Operation::Submit(request) => {
                let category = ctx.category()?;
                let validated = ctx
                    .validated
                    .as_ref()
                    .ok_or_else(|| SubmitError::Internal("data was not validated".to_string()))?;

                let rich_text = category
                    .columns
                    .iter()
                    .filter(|c| c.rich_text)
                    .map(|c| c.name.clone());
                let clean = sanitize_form(validated, &FieldSanitizeOptions::default().with_rich_text(rich_text));

                let status = after_edit(ctx.existing.as_ref().map(|e| e.status), request.intent)?;
                let mut record = match &ctx.existing {
                    Some(existing) => {
                        let mut next = existing.clone();
                        next.data = serde_json::Value::Object(clean);
                        next.status = status;
                        next.version += 1;
                        next.approved_at = None;
                        next.approved_by = None;
                        next.rejection_reason = None;
                        next
                    }
                    None => FormData::new(request.category_id, request.school_id, clean, status),
                };
                if status == FormStatus::Submitted {
                    record.submitted_at = Some(now);
                }
                record
            }
            Operation::Approve { .. } => {
                let mut record = existing(ctx)?;
                record.status = after_review(record.status, FormStatus::Approved)?;
                record.approved_at = Some(now);
                record.approved_by = ctx.actor_user_id();
                record.rejection_reason = None;
                record.version += 1;
                record
            }
            Operation::Reject { reason, .. } => {
                let mut record = existing(ctx)?;
                record.status = after_review(record.status, FormStatus::Rejected)?;
                record.rejection_reason = reason.clone().filter(|r| !r.trim().is_empty());
                record.approved_at = None;
                record.approved_by = None;
                record.version += 1;
                record
            }
        };

        ctx.record = Some(FormData { updated_at: now, ..record });
        Ok(())
    }
}

fn existing(ctx: &SubmissionContext) -> Result<FormData, SubmitError> {
    ctx.existing.clone().ok_or(SubmitError::NotFound("Form entry"))
}
