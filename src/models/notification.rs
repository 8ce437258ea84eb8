use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub is_read: bool,
    pub action_url: Option<String>,
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Notification content before it is addressed to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub body: String,
    #[serde(default = "default_type")]
    pub notification_type: String,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_type() -> String {
    "info".to_string()
}

impl NewNotification {
    pub fn addressed_to(&self, user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            title: self.title.clone(),
            body: self.body.clone(),
            notification_type: self.notification_type.clone(),
            is_read: false,
            action_url: self.action_url.clone(),
            data: self.data.clone(),
            created_at: Utc::now(),
            read_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "delivery_channel", rename_all = "lowercase")]
pub enum DeliveryChannel {
    Email,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Queued email or push payload awaiting dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub id: Uuid,
    pub channel: DeliveryChannel,
    pub recipient: String,
    pub payload: Value,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryJob {
    pub fn pending(channel: DeliveryChannel, recipient: impl Into<String>, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel,
            recipient: recipient.into(),
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
