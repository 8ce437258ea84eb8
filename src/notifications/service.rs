use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{NotificationHub, RealtimeEvent};
use crate::models::{DeliveryChannel, DeliveryJob, EntityPath, NewNotification, Notification, UserProfile};
use crate::permission::{allowed_scopes, has_permission_on};
use crate::store::{SharedStore, StoreError};
use crate::types::{PermissionAction, Scope};

/// Broadcast to every profile within a node of the hierarchy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassNotification {
    #[serde(flatten)]
    pub content: NewNotification,
    #[serde(default)]
    pub region_id: Option<Uuid>,
    #[serde(default)]
    pub sector_id: Option<Uuid>,
    #[serde(default)]
    pub school_id: Option<Uuid>,
    /// Also queue an email for recipients that have an address
    #[serde(default = "default_true")]
    pub send_email: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum MassNotifyError {
    #[error("target {0} not found")]
    TargetNotFound(Uuid),

    #[error("not allowed to notify this target")]
    AccessDenied,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct NotificationService {
    store: SharedStore,
    hub: NotificationHub,
}

impl NotificationService {
    pub fn new(store: SharedStore, hub: NotificationHub) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        self.store.list_notifications(user_id).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError> {
        self.store.unread_count(user_id).await
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, StoreError> {
        let notification = self.store.mark_read(user_id, id).await?;
        self.hub
            .publish(RealtimeEvent::NotificationRead { notification_id: Some(id) }, vec![user_id]);
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let changed = self.store.mark_all_read(user_id).await?;
        if changed > 0 {
            self.hub
                .publish(RealtimeEvent::NotificationRead { notification_id: None }, vec![user_id]);
        }
        Ok(changed)
    }

    /// Persist one notification per recipient, push it live and optionally queue email
    pub async fn notify(
        &self,
        recipients: &[UserProfile],
        content: &NewNotification,
        send_email: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut created = Vec::with_capacity(recipients.len());
        for profile in recipients {
            let notification = self.store.insert_notification(content.addressed_to(profile.user_id)).await?;
            self.hub.publish(
                RealtimeEvent::NotificationCreated {
                    notification: notification.clone(),
                },
                vec![profile.user_id],
            );

            if send_email {
                if let Some(email) = profile.email.as_deref().filter(|e| !e.is_empty()) {
                    let payload = json!({
                        "to": email,
                        "subject": content.title,
                        "body": content.body,
                        "actionUrl": content.action_url,
                    });
                    self.store
                        .enqueue_delivery(DeliveryJob::pending(DeliveryChannel::Email, email, payload))
                        .await?;
                }
            }
            created.push(notification);
        }
        Ok(created)
    }

    /// Requires `manage_users` on the target node; no target means everyone and needs global scope
    pub async fn mass_notify(
        &self,
        actor: Option<&UserProfile>,
        request: MassNotification,
    ) -> Result<Vec<Notification>, MassNotifyError> {
        let path = self.resolve_target(&request).await?;

        let recipients = match &path {
            Some(path) => {
                if !has_permission_on(actor, PermissionAction::ManageUsers, path) {
                    return Err(MassNotifyError::AccessDenied);
                }
                self.store.profiles_within(path).await?
            }
            None => {
                let global = actor.is_some_and(|p| {
                    allowed_scopes(p.role, PermissionAction::ManageUsers).contains(&Scope::Global)
                });
                if !global {
                    return Err(MassNotifyError::AccessDenied);
                }
                self.store.list_profiles().await?
            }
        };

        let created = self.notify(&recipients, &request.content, request.send_email).await?;
        tracing::info!(
            "Mass notification '{}' sent to {} recipient(s)",
            request.content.title,
            created.len()
        );
        Ok(created)
    }

    async fn resolve_target(&self, request: &MassNotification) -> Result<Option<EntityPath>, MassNotifyError> {
        if let Some(id) = request.school_id {
            return self.store.school_path(id).await?.map(Some).ok_or(MassNotifyError::TargetNotFound(id));
        }
        if let Some(id) = request.sector_id {
            return self.store.sector_path(id).await?.map(Some).ok_or(MassNotifyError::TargetNotFound(id));
        }
        if let Some(id) = request.region_id {
            return match self.store.get_region(id).await? {
                Some(region) => Ok(Some(EntityPath::region(region.id))),
                None => Err(MassNotifyError::TargetNotFound(id)),
            };
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProfileInput, Region, Sector};
    use crate::store::{MemoryStore, Store};
    use crate::types::Role;
    use std::sync::Arc;

    fn profile(role: Role, region: Option<Uuid>, sector: Option<Uuid>, email: Option<&str>) -> UserProfile {
        UserProfile::from_input(ProfileInput {
            user_id: None,
            first_name: "N".into(),
            last_name: "M".into(),
            email: email.map(String::from),
            role,
            region_id: region,
            sector_id: sector,
            school_id: None,
        })
        .unwrap()
    }

    fn content() -> NewNotification {
        NewNotification {
            title: "Deadline".into(),
            body: "Submit staff data by Friday".into(),
            notification_type: "deadline".into(),
            action_url: None,
            data: None,
        }
    }

    #[tokio::test]
    async fn mass_notification_respects_scope() {
        let store = Arc::new(MemoryStore::new());
        let region = store.create_region(Region::new("Ganja")).await.unwrap();
        let other = store.create_region(Region::new("Sumgait")).await.unwrap();
        let sector = store.create_sector(Sector::new("Central", region.id)).await.unwrap();

        let region_admin = store
            .create_profile(profile(Role::Regionadmin, Some(region.id), None, None))
            .await
            .unwrap();
        store
            .create_profile(profile(Role::Sectoradmin, None, Some(sector.id), Some("sector@example.com")))
            .await
            .unwrap();

        let service = NotificationService::new(store.clone(), NotificationHub::new(8));
        let request = |region_id| MassNotification {
            content: content(),
            region_id: Some(region_id),
            sector_id: None,
            school_id: None,
            send_email: true,
        };

        let sent = service.mass_notify(Some(&region_admin), request(region.id)).await.unwrap();
        assert_eq!(sent.len(), 2);
        let queued = store.pending_deliveries(DeliveryChannel::Email, 10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].recipient, "sector@example.com");

        let denied = service.mass_notify(Some(&region_admin), request(other.id)).await;
        assert!(matches!(denied, Err(MassNotifyError::AccessDenied)));
    }

    #[tokio::test]
    async fn mark_all_read_reports_changes() {
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(store.clone(), NotificationHub::new(8));
        let user = profile(Role::Superadmin, None, None, None);

        service.notify(&[user.clone(), user.clone()], &content(), false).await.unwrap();
        assert_eq!(service.unread_count(user.user_id).await.unwrap(), 2);
        assert_eq!(service.mark_all_read(user.user_id).await.unwrap(), 2);
        assert_eq!(service.mark_all_read(user.user_id).await.unwrap(), 0);
    }
}
