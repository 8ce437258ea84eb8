// Notification bridge: persisted notifications, realtime fan-out and email/push dispatch.

pub mod dispatch;
pub mod realtime;
pub mod service;

pub use dispatch::{process_notifications, Deliverer, DispatchError, DispatchReport, HttpDeliverer};
pub use realtime::{NotificationHub, RealtimeEvent, Subscription};
pub use service::{MassNotification, MassNotifyError, NotificationService};
