//! Periodic push of forecast bundles to WebSocket subscribers.

use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::time::{self, MissedTickBehavior};
use weathercast_core::WeatherFeed;

use crate::sessions::SessionRegistry;

/// Push every `period` until the task is dropped.
pub async fn run(feed: WeatherFeed, sessions: Arc<SessionRegistry>, period: Duration) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(period_secs = period.as_secs(), "broadcaster started");

    loop {
        ticker.tick().await;
        tick(&feed, &sessions).await;
    }
}

/// One round: each subscribed location is fetched once, however many sessions
/// share it. Failures are logged and that location is skipped.
pub async fn tick(feed: &WeatherFeed, sessions: &SessionRegistry) -> usize {
    if sessions.is_empty() {
        return 0;
    }
    let locations = sessions.locations();

    let results = join_all(locations.iter().map(|location| async move {
        (location, feed.forecast(location).await)
    }))
    .await;

    let mut delivered = 0;
    for (location, result) in results {
        let bundle = match result {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::error!(%location, "failed to build forecast for broadcast: {e}");
                continue;
            }
        };

        match serde_json::to_string(&bundle) {
            Ok(message) => delivered += sessions.publish(location, &message),
            Err(e) => tracing::error!(%location, "failed to serialize forecast: {e}"),
        }
    }

    tracing::debug!(
        locations = locations.len(),
        sessions = sessions.len(),
        delivered,
        "broadcast tick"
    );
    delivered
}
