// Ring 2: schema validation of the submitted data
use async_trait::async_trait;

use crate::schema::build_schema;
use crate::submission::context::{Operation, OperationKind, SubmissionContext};
use crate::submission::traits::{Observer, ObserverRing};
use crate::submission::SubmitError;

pub struct SchemaValidationObserver;

#[async_trait]
impl Observer for SchemaValidationObserver {
    fn name(&self) -> &'static str {
        "SchemaValidationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to(&self, op: OperationKind) -> bool {
        op == OperationKind::Submit
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let Operation::Submit(request) = &ctx.operation else {
            return Ok(());
        };

        let category = ctx.category()?;
        let validator = build_schema(&category.columns, &ctx.rules, &ctx.schema_options)?;
        let validated = validator.validate(&request.data)?;

        tracing::debug!("Validated {} of {} submitted field(s)", validated.len(), request.data.len());
        ctx.validated = Some(validated);
        Ok(())
    }
}
