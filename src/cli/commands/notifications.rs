use std::time::Duration;

use crate::config::config;
use crate::notifications::{process_notifications, HttpDeliverer};
use crate::store;

/// Drain the delivery queue once, or keep polling until interrupted
pub async fn run(once: bool) -> anyhow::Result<()> {
    let settings = &config().notifications;
    let store = store::connect().await?;
    let deliverer = HttpDeliverer::new(settings)?;
    let interval = Duration::from_secs(settings.poll_interval_secs.max(1));

    loop {
        let report = process_notifications(store.as_ref(), &deliverer, settings).await?;
        if once {
            println!("{}", serde_json::to_string(&report)?);
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Notification worker stopped");
                return Ok(());
            }
        }
    }
}
