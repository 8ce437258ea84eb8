// Ring 5: realtime event plus reviewer/owner notifications
use async_trait::async_trait;
use serde_json::json;

use crate::models::{EntityPath, FormData, NewNotification, UserProfile};
use crate::notifications::RealtimeEvent;
use crate::permission::has_permission_on;
use crate::submission::context::SubmissionContext;
use crate::submission::traits::{Observer, ObserverRing};
use crate::submission::SubmitError;
use crate::types::{FormStatus, PermissionAction, Role};

pub struct StatusNotificationObserver;

#[async_trait]
impl Observer for StatusNotificationObserver {
    fn name(&self) -> &'static str {
        "StatusNotificationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Notification
    }

    async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let Some(form) = ctx.result.clone() else {
            return Ok(());
        };
        let path = *ctx.path()?;
        let category = ctx.category()?.name.clone();
        let school = ctx.school()?.name.clone();

        let recipients = match form.status {
            FormStatus::Submitted => reviewers(ctx, &path).await?,
            FormStatus::Approved | FormStatus::Rejected => owners(ctx, &path).await?,
            FormStatus::Draft => Vec::new(),
        };

        if !recipients.is_empty() {
            let content = content_for(&form, &category, &school);
            ctx.notifications.notify(&recipients, &content, true).await?;
        }

        let mut audience: Vec<_> = recipients.iter().map(|p| p.user_id).collect();
        audience.extend(ctx.actor_user_id());
        ctx.notifications.hub().publish(
            RealtimeEvent::FormStatusChanged {
                form_id: form.id,
                category_id: form.category_id,
                school_id: form.school_id,
                status: form.status,
            },
            audience,
        );
        Ok(())
    }
}

/// Admins who can approve forms for the school, excluding the actor
async fn reviewers(ctx: &SubmissionContext, path: &EntityPath) -> Result<Vec<UserProfile>, SubmitError> {
    let region = EntityPath::region(path.region_id);
    let actor = ctx.actor_user_id();
    Ok(ctx
        .store
        .profiles_within(&region)
        .await?
        .into_iter()
        .filter(|p| Some(p.user_id) != actor)
        .filter(|p| has_permission_on(Some(p), PermissionAction::ApproveForms, path))
        .collect())
}

/// School admins of the school the entry belongs to
async fn owners(ctx: &SubmissionContext, path: &EntityPath) -> Result<Vec<UserProfile>, SubmitError> {
    Ok(ctx
        .store
        .profiles_within(path)
        .await?
        .into_iter()
        .filter(|p| p.role == Role::Schooladmin)
        .collect())
}

fn content_for(form: &FormData, category: &str, school: &str) -> NewNotification {
    let (title, body, kind) = match form.status {
        FormStatus::Submitted => (
            "Form submitted for review".to_string(),
            format!("{} submitted {}", school, category),
            "form_submitted",
        ),
        FormStatus::Approved => (
            "Form approved".to_string(),
            format!("{} for {} was approved", category, school),
            "form_approved",
        ),
        FormStatus::Rejected => (
            "Form rejected".to_string(),
            match form.rejection_reason.as_deref() {
                Some(reason) => format!("{} for {} was rejected: {}", category, school, reason),
                None => format!("{} for {} was rejected", category, school),
            },
            "form_rejected",
        ),
        FormStatus::Draft => ("Form saved".to_string(), format!("{} saved for {}", category, school), "info"),
    };

    NewNotification {
        title,
        body,
        notification_type: kind.to_string(),
        action_url: Some(format!("/forms/{}", form.id)),
        data: Some(json!({
            "formId": form.id,
            "categoryId": form.category_id,
            "schoolId": form.school_id,
            "status": form.status,
        })),
    }
}
