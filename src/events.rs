//! Docker event subscription.
//!
//! Every event marks the tracker dirty and nothing more; the reconciliation
//! loop decides when to act. The subscription is reopened after a fixed
//! delay whenever Docker closes it, since the stream can die silently.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::runtime::ContainerRuntime;
use crate::staleness::StalenessTracker;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

pub struct EventSubscriber {
    handle: JoinHandle<()>,
}

impl EventSubscriber {
    pub fn spawn<R: ContainerRuntime>(runtime: Arc<R>, tracker: Arc<StalenessTracker>) -> Self {
        let handle = tokio::spawn(watch(runtime, tracker));
        Self { handle }
    }

    /// Drop the subscription. Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.handle.abort();
    }
}

async fn watch<R: ContainerRuntime>(runtime: Arc<R>, tracker: Arc<StalenessTracker>) {
    loop {
        let mut stream = runtime.events();
        info!("Listening for Docker events...");

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(event) => {
                    debug!("Docker event: {} for {}", event.action, event.actor);
                    if !tracker.is_dirty() {
                        debug!("Container set changed, config is stale");
                    }
                    tracker.mark_dirty();
                }
                Err(e) => {
                    warn!("Error in Docker event stream: {}", e);
                    break;
                }
            }
        }

        // Anything could have happened while we weren't listening.
        tracker.mark_dirty();
        warn!(
            "Docker event stream ended. Resubscribing in {}s...",
            RESUBSCRIBE_DELAY.as_secs()
        );
        sleep(RESUBSCRIBE_DELAY).await;
    }
}
