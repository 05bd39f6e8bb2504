//! Shutdown on SIGINT, SIGTERM or SIGQUIT.
//!
//! No draining: a reconciliation pass that is in flight is abandoned, and
//! the next start rewrites the config from scratch anyway.

use std::fmt;
use std::io;

use log::info;
use tokio::sync::watch;

use crate::events::EventSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Quit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
        })
    }
}

/// Wait for the first termination signal.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::select! {
        _ = interrupt.recv() => Signal::Interrupt,
        _ = terminate.recv() => Signal::Terminate,
        _ = quit.recv() => Signal::Quit,
    })
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    Ok(Signal::Interrupt)
}

/// Stops the reconciliation loop's timer and drops the event subscription.
pub struct Shutdown {
    stop: watch::Sender<bool>,
}

impl Shutdown {
    /// Returns the handle and the receiver the reconciliation loop watches.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (stop, rx) = watch::channel(false);
        (Self { stop }, rx)
    }

    pub fn trigger(&self, subscriber: &EventSubscriber) {
        info!("Unsubscribing from Docker events");
        subscriber.unsubscribe();
        // The loop may already be gone.
        let _ = self.stop.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;
    use crate::staleness::StalenessTracker;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_stops_loop_receiver() {
        let runtime = Arc::new(FakeRuntime::default());
        let subscriber = EventSubscriber::spawn(runtime, Arc::new(StalenessTracker::new()));
        let (shutdown, mut rx) = Shutdown::new();

        shutdown.trigger(&subscriber);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_trigger_after_loop_exit() {
        let runtime = Arc::new(FakeRuntime::default());
        let subscriber = EventSubscriber::spawn(runtime, Arc::new(StalenessTracker::new()));
        let (shutdown, rx) = Shutdown::new();
        drop(rx);
        shutdown.trigger(&subscriber);
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(Signal::Interrupt.to_string(), "SIGINT");
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
        assert_eq!(Signal::Quit.to_string(), "SIGQUIT");
    }
}
