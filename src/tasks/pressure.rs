//! Memory Pressure Relay
//!
//! Background task forwarding host low-memory events to a [`MemoryPressure`]
//! handle.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::MemoryPressure;

/// Spawns a task that calls [`MemoryPressure::notify`] for every event
/// received on `events`.
///
/// The task ends when every sender is dropped; abort the returned handle to
/// stop it earlier.
///
/// # Example
/// ```ignore
/// let (tx, rx) = tokio::sync::mpsc::channel(8);
/// let relay = spawn_pressure_relay(pressure.clone(), rx);
/// tx.send(()).await?;
/// relay.abort();
/// ```
pub fn spawn_pressure_relay(
    pressure: MemoryPressure,
    mut events: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting memory pressure relay");

        while events.recv().await.is_some() {
            let purged = pressure.notify();
            info!("Memory pressure: purged {} caches", purged);
        }

        info!("Memory pressure relay stopped");
    })
}
