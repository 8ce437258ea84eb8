// Ring 0: loads everything later rings need
use async_trait::async_trait;

use crate::permission::category_visible_to;
use crate::submission::context::{Operation, SubmissionContext};
use crate::submission::traits::{Observer, ObserverRing};
use crate::submission::SubmitError;

pub struct DataPreparationObserver;

#[async_trait]
impl Observer for DataPreparationObserver {
    fn name(&self) -> &'static str {
        "DataPreparationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::DataPreparation
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let (category_id, school_id) = match &ctx.operation {
            Operation::Submit(request) => {
                let existing = match request.existing_id {
                    Some(id) => {
                        let entry = ctx.store.get_form(id).await?.ok_or(SubmitError::NotFound("Form entry"))?;
                        if entry.category_id != request.category_id || entry.school_id != request.school_id {
                            return Err(SubmitError::Conflict(
                                "Form entry belongs to a different category or school".to_string(),
                            ));
                        }
                        Some(entry)
                    }
                    // One entry per (category, school): a missing id still updates the current row
                    None => ctx.store.find_form(request.category_id, request.school_id).await?,
                };
                ctx.existing = existing;
                (request.category_id, request.school_id)
            }
            Operation::Approve { form_id } | Operation::Reject { form_id, .. } => {
                let entry = ctx
                    .store
                    .get_form(*form_id)
                    .await?
                    .ok_or(SubmitError::NotFound("Form entry"))?;
                let ids = (entry.category_id, entry.school_id);
                ctx.existing = Some(entry);
                ids
            }
        };

        let category = ctx
            .store
            .get_category(category_id)
            .await?
            .ok_or(SubmitError::NotFound("Category"))?;
        let school = ctx.store.get_school(school_id).await?.ok_or(SubmitError::NotFound("School"))?;
        let path = ctx.store.school_path(school_id).await?.ok_or(SubmitError::NotFound("School"))?;

        if !category_visible_to(&category, &path) {
            return Err(SubmitError::NotFound("Category"));
        }

        ctx.rules = ctx.store.list_rules(category_id).await?;
        tracing::debug!(
            "Prepared {} for category '{}' at school '{}' ({} columns, {} rules)",
            ctx.kind(),
            category.name,
            school.name,
            category.columns.len(),
            ctx.rules.len()
        );

        ctx.category = Some(category);
        ctx.school = Some(school);
        ctx.path = Some(path);
        Ok(())
    }
}
