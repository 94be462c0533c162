//! Coalescing of concurrent identical operations.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::trace;
use tokio::task::JoinError;

type Flight<T> = Shared<BoxFuture<'static, T>>;
type Slot<T> = Arc<Mutex<Option<(u64, Flight<T>)>>>;

fn lock<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<(u64, Flight<T>)>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Empties the slot once the owning task finishes, including by panic.
struct Release<T: Clone + Send + Sync + 'static> {
    slot: Slot<T>,
    id: u64,
}

impl<T: Clone + Send + Sync + 'static> Drop for Release<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|(id, _)| *id == self.id) {
            *slot = None;
        }
    }
}

/// At most one instance of an operation runs at a time; callers arriving
/// while it runs await the same outcome.
///
/// The operation runs on its own task, so a caller that stops waiting
/// neither cancels it nor causes a second attempt.
pub(crate) struct SingleFlight<T: Clone + Send + Sync + 'static> {
    slot: Slot<T>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn in_flight(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Join the running operation, or start `operation` if none is running.
    ///
    /// `on_abort` maps a panicked or cancelled task into an outcome.
    pub(crate) async fn run<F, Fut>(&self, operation: F, on_abort: fn(JoinError) -> T) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = lock(&self.slot);

            match slot.as_ref() {
                Some((id, flight)) => {
                    trace!("Joining in-flight operation {id}");
                    flight.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let release = Release {
                        slot: Arc::clone(&self.slot),
                        id,
                    };
                    let work = operation();

                    let task = tokio::spawn(async move {
                        let _release = release;
                        work.await
                    });

                    let flight = async move { task.await.unwrap_or_else(on_abort) }
                        .boxed()
                        .shared();
                    *slot = Some((id, flight.clone()));
                    flight
                }
            }
        };

        flight.await
    }
}
