//! The reconciliation loop.
//!
//! A pass reads the running containers, renders the dnsmasq config and
//! applies it. One pass runs unconditionally at startup. After that the
//! loop wakes on a fixed interval and runs a pass only if the staleness
//! tracker is dirty. Events never trigger a pass directly, so a burst of
//! container starts costs a single dnsmasq restart.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::apply::Applier;
use crate::error::Error;
use crate::render::render;
use crate::runtime::ContainerRuntime;
use crate::staleness::{StalenessGuard, StalenessTracker};

pub struct Reconciler<R, A> {
    runtime: Arc<R>,
    applier: A,
    tracker: Arc<StalenessTracker>,
    interval: Duration,
}

impl<R: ContainerRuntime, A: Applier> Reconciler<R, A> {
    pub fn new(
        runtime: Arc<R>,
        applier: A,
        tracker: Arc<StalenessTracker>,
        interval: Duration,
    ) -> Self {
        Self {
            runtime,
            applier,
            tracker,
            interval,
        }
    }

    /// Run a pass regardless of the tracker. Returns the number of entries
    /// written.
    pub async fn reconcile_now(&self) -> Result<usize, Error> {
        self.pass(self.tracker.force()).await
    }

    /// Run a pass if the tracker is dirty.
    pub async fn tick(&self) -> Result<Option<usize>, Error> {
        match self.tracker.take_if_dirty() {
            Some(guard) => self.pass(guard).await.map(Some),
            None => {
                debug!("Nothing changed, skipping reconciliation");
                Ok(None)
            }
        }
    }

    async fn pass(&self, guard: StalenessGuard<'_>) -> Result<usize, Error> {
        let snapshot = self.runtime.snapshot().await?;
        let document = render(&snapshot);
        self.applier.apply(&snapshot, &document).await?;
        guard.commit();
        if document.is_empty() {
            info!("No running containers with a virtual host");
        }
        info!(
            "Wrote {} dnsmasq entries for {} running containers",
            document.entries(),
            snapshot.len()
        );
        Ok(document.entries())
    }

    /// Tick until `stop` flips or a pass fails. The first tick fires one
    /// interval from now.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> Result<(), Error> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await?;
                }
                res = stop.changed() => {
                    if res.is_err() || *stop.borrow() {
                        info!("Reconciliation loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}
