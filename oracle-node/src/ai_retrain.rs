//! AI-retrain loop (§5 "one AI-retrain loop"). The Scheduler's DataFeed
//! handler already recomputes volatility/confidence on every fulfillment
//! (§4.8(e)-(f)); this loop surfaces that state on a fixed cadence
//! independent of fulfillment traffic, the way a periodic retrain job
//! would, without pulling in the out-of-scope anomaly-detection library
//! (SPEC_FULL §D).

use crate::feed_registry::FeedRegistry;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

const RETRAIN_INTERVAL: Duration = Duration::from_secs(300);

pub async fn run(feeds: FeedRegistry, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(RETRAIN_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for status in feeds.live_status() {
                    debug!(
                        feed_id = %status.feed_id,
                        confidence = status.confidence,
                        outliers = status.outlier_count,
                        "ai retrain summary"
                    );
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("ai retrain loop stopped");
}
