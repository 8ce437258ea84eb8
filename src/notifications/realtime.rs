use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::Notification;
use crate::types::FormStatus;

/// Event pushed to connected clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    NotificationCreated {
        notification: Notification,
    },
    #[serde(rename_all = "camelCase")]
    NotificationRead {
        /// `None` when every notification of the user was marked read
        notification_id: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    FormStatusChanged {
        form_id: Uuid,
        category_id: Uuid,
        school_id: Uuid,
        status: FormStatus,
    },
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::NotificationCreated { .. } => "notification_created",
            RealtimeEvent::NotificationRead { .. } => "notification_read",
            RealtimeEvent::FormStatusChanged { .. } => "form_status_changed",
        }
    }
}

#[derive(Debug)]
struct Envelope {
    recipients: Vec<Uuid>,
    event: RealtimeEvent,
}

struct Session {
    token: CancellationToken,
    generation: u64,
}

/// Session ids are client-chosen, so they are only unique per user
type SessionKey = (Uuid, String);

struct Inner {
    sender: broadcast::Sender<Arc<Envelope>>,
    sessions: Mutex<HashMap<SessionKey, Session>>,
    generation: std::sync::atomic::AtomicU64,
}

/// Fan-out of realtime events with at most one live subscription per user session
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<Inner>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                sender,
                sessions: Mutex::new(HashMap::new()),
                generation: std::sync::atomic::AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config() -> Self {
        Self::new(crate::config::config().notifications.channel_capacity)
    }

    /// Deliver `event` to the listed users' live subscriptions. No-op without listeners.
    pub fn publish(&self, event: RealtimeEvent, recipients: Vec<Uuid>) {
        if recipients.is_empty() {
            return;
        }
        let name = event.name();
        match self.inner.sender.send(Arc::new(Envelope { recipients, event })) {
            Ok(listeners) => tracing::debug!("Published {} to {} listener(s)", name, listeners),
            Err(_) => tracing::trace!("Published {} with no listeners", name),
        }
    }

    /// Open the subscription for the user's `session`, tearing down any previous one
    pub fn subscribe(&self, session: &str, user_id: Uuid) -> Subscription {
        let generation = self
            .inner
            .generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        let token = CancellationToken::new();

        {
            let mut sessions = self.lock_sessions();
            let previous = sessions.insert(
                (user_id, session.to_string()),
                Session {
                    token: token.clone(),
                    generation,
                },
            );
            if let Some(previous) = previous {
                tracing::debug!("Session {} re-subscribed, closing previous stream", session);
                previous.token.cancel();
            }
        }

        Subscription {
            hub: self.clone(),
            session: session.to_string(),
            user_id,
            generation,
            token,
            receiver: self.inner.sender.subscribe(),
        }
    }

    pub fn is_connected(&self, user_id: Uuid, session: &str) -> bool {
        self.lock_sessions().contains_key(&(user_id, session.to_string()))
    }

    /// Live sessions across all users
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn receiver_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    fn disconnect(&self, key: &SessionKey, generation: u64) {
        let mut sessions = self.lock_sessions();
        // A newer subscription owns the session now
        if sessions.get(key).is_some_and(|entry| entry.generation == generation) {
            sessions.remove(key);
        }
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SessionKey, Session>> {
        // A poisoned map only means a panic mid-insert; the data is still usable
        self.inner.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One live stream of events for a user
pub struct Subscription {
    hub: NotificationHub,
    session: String,
    user_id: Uuid,
    generation: u64,
    token: CancellationToken,
    receiver: broadcast::Receiver<Arc<Envelope>>,
}

impl Subscription {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Next event for this user. `None` ends the stream: torn down, lagged or closed.
    pub async fn next(&mut self) -> Option<RealtimeEvent> {
        loop {
            let received = tokio::select! {
                _ = self.token.cancelled() => return None,
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(envelope) if envelope.recipients.contains(&self.user_id) => {
                    return Some(envelope.event.clone());
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Realtime stream for session {} lagged by {} events, closing",
                        self.session,
                        skipped
                    );
                    return None;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let key = (self.user_id, std::mem::take(&mut self.session));
        self.hub.disconnect(&key, self.generation);
    }
}
