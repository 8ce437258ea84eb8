// Ring 1: permission and status checks
use async_trait::async_trait;

use crate::permission::has_permission_on;
use crate::submission::context::{Operation, OperationKind, SubmissionContext};
use crate::submission::state::{after_edit, after_review};
use crate::submission::traits::{Observer, ObserverRing};
use crate::submission::SubmitError;
use crate::types::{FormStatus, PermissionAction};

pub struct AccessObserver;

#[async_trait]
impl Observer for AccessObserver {
    fn name(&self) -> &'static str {
        "AccessObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Security
    }

    fn priority(&self) -> u8 {
        10
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let action = match ctx.kind() {
            OperationKind::Submit => PermissionAction::SubmitForms,
            OperationKind::Approve | OperationKind::Reject => PermissionAction::ApproveForms,
        };

        if !has_permission_on(ctx.actor.as_ref(), action, ctx.path()?) {
            return Err(SubmitError::AccessDenied(action));
        }
        Ok(())
    }
}

pub struct TransitionObserver;

#[async_trait]
impl Observer for TransitionObserver {
    fn name(&self) -> &'static str {
        "TransitionObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Security
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let current = ctx.existing.as_ref().map(|e| e.status);
        match &ctx.operation {
            Operation::Submit(request) => after_edit(current, request.intent).map(|_| ()),
            Operation::Approve { .. } => review(current, FormStatus::Approved),
            Operation::Reject { .. } => review(current, FormStatus::Rejected),
        }
    }
}

fn review(current: Option<crate::types::FormStatus>, decision: FormStatus) -> Result<(), SubmitError> {
    let current = current.ok_or(SubmitError::NotFound("Form entry"))?;
    after_review(current, decision).map(|_| ())
}
