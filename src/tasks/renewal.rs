//! Renewal Worker
//!
//! Background thread that applies bump renewals off the caller's path.
//!
//! Jobs are fire-and-forget: there is no completion signal, no cancellation
//! and no ordering relative to other writes on the same key.

use std::thread;

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

type RenewalJob = Box<dyn FnOnce() + Send + 'static>;

// == Renewal Queue ==
/// Handle to a renewal worker. Clones share the worker; it exits once every
/// handle is dropped and the queue has drained.
#[derive(Clone, Debug)]
pub struct RenewalQueue {
    sender: Option<UnboundedSender<RenewalJob>>,
}

impl RenewalQueue {
    // == Spawn ==
    /// Starts a worker thread named after the cache.
    ///
    /// If the thread cannot be started, renewals run inline on the caller.
    pub fn spawn(name: &str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<RenewalJob>();
        let thread_name = format!("{}-renewal", name);

        let spawned = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(worker = %thread::current().name().unwrap_or_default(), "Renewal worker started");
                while let Some(job) = receiver.blocking_recv() {
                    job();
                }
                debug!("Renewal worker stopped");
            });

        match spawned {
            Ok(_) => Self {
                sender: Some(sender),
            },
            Err(err) => {
                warn!(worker = %thread_name, error = %err, "Renewal worker unavailable, renewing inline");
                Self::inline()
            }
        }
    }

    /// A queue without a worker; every job runs on the dispatching thread.
    pub fn inline() -> Self {
        Self { sender: None }
    }

    // == Dispatch ==
    /// Queues `job` for the worker without waiting for it.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => {
                // Worker gone (a job panicked): fall back to running here.
                if let Err(mpsc::error::SendError(job)) = sender.send(Box::new(job)) {
                    job();
                }
            }
            None => job(),
        }
    }
}
