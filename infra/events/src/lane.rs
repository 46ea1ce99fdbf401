//! The single worker that owns the registry.
//!
//! Every bus operation becomes a [`Task`] on an unbounded queue; the lane
//! executes them one at a time in arrival order and answers over a oneshot.

use crate::callback::{Callback, invoke};
use crate::handle::{RegistrationId, SubscriptionHandle};
use crate::registry::Registry;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

/// Lifecycle of a bus.
///
/// Only ever moves forward: `Open -> Draining -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BusState {
    /// Accepting tasks.
    Open,
    /// Shutdown requested; queued tasks still run, new ones are rejected.
    Draining,
    /// The lane thread has exited.
    Closed,
}

pub(crate) enum Task<K, T> {
    Subscribe {
        key: K,
        id: RegistrationId,
        callback: Box<dyn Callback<T>>,
        reply: oneshot::Sender<()>,
    },
    Unsubscribe {
        handle: SubscriptionHandle<K>,
        reply: oneshot::Sender<bool>,
    },
    Emit {
        key: K,
        payload: T,
        reply: oneshot::Sender<bool>,
    },
    ListenerCount {
        key: K,
        reply: oneshot::Sender<usize>,
    },
}

impl<K, T> Task<K, T> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Emit { .. } => "emit",
            Self::ListenerCount { .. } => "listener_count",
        }
    }
}

impl<K: fmt::Debug, T> fmt::Debug for Task<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe { key, id, .. } => {
                f.debug_struct("Subscribe").field("key", key).field("id", id).finish_non_exhaustive()
            },
            Self::Unsubscribe { handle, .. } => {
                f.debug_struct("Unsubscribe").field("handle", handle).finish_non_exhaustive()
            },
            Self::Emit { key, .. } => f.debug_struct("Emit").field("key", key).finish_non_exhaustive(),
            Self::ListenerCount { key, .. } => {
                f.debug_struct("ListenerCount").field("key", key).finish_non_exhaustive()
            },
        }
    }
}

/// How the lane thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaneExit {
    Drained,
    Panicked,
}

/// State shared between the bus handles and the lane thread.
///
/// Deliberately holds no queue sender, so the lane never keeps itself alive.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: watch::Sender<BusState>,
    exit: Mutex<Option<LaneExit>>,
    terminated: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::Sender::new(BusState::Open),
            exit: Mutex::new(None),
            terminated: Condvar::new(),
        }
    }

    pub(crate) fn current(&self) -> BusState {
        *self.state.borrow()
    }

    /// Moves the state forward; returns `false` if it was already at or past `next`.
    pub(crate) fn advance(&self, next: BusState) -> bool {
        self.state.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    fn finish(&self, exit: LaneExit) {
        let mut slot = self.exit.lock();
        *slot = Some(exit);
        self.advance(BusState::Closed);
        self.terminated.notify_all();
    }

    /// Waits up to `timeout` for the lane to exit.
    pub(crate) fn wait_for_exit(&self, timeout: Duration) -> Option<LaneExit> {
        let mut exit = self.exit.lock();
        if exit.is_none() {
            let _ = self.terminated.wait_while_for(&mut exit, |exit| exit.is_none(), timeout);
        }
        *exit
    }

    pub(crate) async fn closed(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = state.wait_for(|state| *state == BusState::Closed).await;
    }
}

/// Marks the lifecycle closed however the lane loop ends.
struct ExitGuard(Arc<Lifecycle>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let exit = if std::thread::panicking() { LaneExit::Panicked } else { LaneExit::Drained };
        self.0.finish(exit);
    }
}

pub(crate) struct Lane<K, T> {
    name: String,
    tasks: mpsc::UnboundedReceiver<Task<K, T>>,
    registry: Registry<K, T>,
    lifecycle: Arc<Lifecycle>,
}

impl<K, T> Lane<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub(crate) fn new(
        name: String,
        tasks: mpsc::UnboundedReceiver<Task<K, T>>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self { name, tasks, registry: Registry::new(), lifecycle }
    }

    /// Runs until every sender is gone and the queue is empty.
    ///
    /// Must run on a dedicated thread: it blocks on the queue.
    pub(crate) fn run(self) {
        // Declared first so it drops last, after the queue and the registry.
        let _guard = ExitGuard(Arc::clone(&self.lifecycle));
        let Self { name, mut tasks, mut registry, .. } = self;
        info!(lane = %name, "Event lane started");

        let mut executed = 0u64;
        while let Some(task) = tasks.blocking_recv() {
            trace!(lane = %name, task = task.name(), "Executing lane task");
            execute(&mut registry, task);
            executed = executed.saturating_add(1);
        }

        let keys = registry.len();
        registry.clear();
        info!(lane = %name, executed, discarded_keys = keys, "Event lane drained and stopped");
    }
}

fn execute<K, T>(registry: &mut Registry<K, T>, task: Task<K, T>)
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    match task {
        Task::Subscribe { key, id, callback, reply } => {
            debug!(?key, %id, "Registering listener");
            let listeners = registry.insert(key, id, callback);
            trace!(%id, listeners, "Listener registered");
            let _ = reply.send(());
        },
        Task::Unsubscribe { handle, reply } => {
            let removed = registry.remove(&handle);
            debug!(key = ?handle.key(), id = %handle.id(), removed, "Unregistering listener");
            let _ = reply.send(removed);
        },
        Task::Emit { key, payload, reply } => {
            let delivered = emit(registry, &key, &payload);
            let _ = reply.send(delivered);
        },
        Task::ListenerCount { key, reply } => {
            let _ = reply.send(registry.listener_count(&key));
        },
    }
}

/// Delivers `payload` to every listener of `key`, in registration order.
///
/// A failing listener never stops delivery to the rest. Returns `true` only if
/// there was at least one listener and none failed.
fn emit<K, T>(registry: &Registry<K, T>, key: &K, payload: &T) -> bool
where
    K: Eq + Hash + fmt::Debug,
{
    let Some(listeners) = registry.listeners(key) else {
        trace!(?key, "Event dropped: no listeners");
        return false;
    };

    let mut failed = 0usize;
    for listener in listeners {
        if let Err(failure) = invoke(listener.callback.as_ref(), payload) {
            failed += 1;
            warn!(?key, id = %listener.id, %failure, "Listener failed; continuing delivery");
        }
    }

    trace!(?key, listeners = listeners.len(), failed, "Event dispatched");
    failed == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Box<dyn Callback<u32>> {
        let counter = Arc::clone(counter);
        Box::new(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn emit_without_listeners_is_false() {
        let registry = Registry::<&str, u32>::new();
        assert!(!emit(&registry, &"nobody", &1));
    }

    #[test]
    fn emit_isolates_failures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::<&str, u32>::new();
        registry.insert("k", RegistrationId::next(), counting(&hits));
        registry.insert("k", RegistrationId::next(), Box::new(|_: &u32| Err::<(), _>("rejected")));
        registry.insert("k", RegistrationId::next(), counting(&hits));

        assert!(!emit(&registry, &"k", &1));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lifecycle_only_moves_forward() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(BusState::Draining));
        assert!(!lifecycle.advance(BusState::Open));
        assert!(lifecycle.advance(BusState::Closed));
        assert!(!lifecycle.advance(BusState::Draining));
        assert_eq!(lifecycle.current(), BusState::Closed);
    }

    #[test]
    fn wait_for_exit_times_out_while_running() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.wait_for_exit(Duration::from_millis(10)), None);
        lifecycle.finish(LaneExit::Drained);
        assert_eq!(lifecycle.wait_for_exit(Duration::ZERO), Some(LaneExit::Drained));
    }

    #[test]
    fn lane_drains_queue_after_senders_drop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let lifecycle = Arc::new(Lifecycle::new());
        let lane = Lane::new("test-lane".to_owned(), rx, Arc::clone(&lifecycle));

        let hits = Arc::new(AtomicUsize::new(0));
        let (sub_tx, _sub_rx) = oneshot::channel();
        let (emit_tx, mut emit_rx) = oneshot::channel();
        tx.send(Task::Subscribe {
            key: "k",
            id: RegistrationId::next(),
            callback: counting(&hits),
            reply: sub_tx,
        })
        .unwrap();
        tx.send(Task::Emit { key: "k", payload: 9, reply: emit_tx }).unwrap();
        drop(tx);

        lane.run();

        assert_eq!(emit_rx.try_recv(), Ok(true));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.current(), BusState::Closed);
    }
}
