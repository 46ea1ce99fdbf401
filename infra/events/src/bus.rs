use crate::builder::EventBusBuilder;
use crate::callback::Callback;
use crate::error::EventBusError;
use crate::handle::{RegistrationId, Subscription, SubscriptionHandle};
use crate::lane::{BusState, LaneExit, Lifecycle, Task};
use crate::pending::Pending;
use parking_lot::Mutex;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Marker trait for types usable as event keys.
///
/// Any `Eq + Hash + Clone + Debug + Send + 'static` type qualifies; `&'static str`,
/// `String` and fieldless enums are the usual choices.
pub trait EventKey: Eq + Hash + Clone + Debug + Send + 'static {}
impl<K: Eq + Hash + Clone + Debug + Send + 'static> EventKey for K {}

/// Marker trait for event payloads.
///
/// Payloads move to the lane thread and are lent to each listener by reference.
pub trait Payload: Send + 'static {}
impl<T: Send + 'static> Payload for T {}

/// An in-process publish/subscribe bus with a single serialized lane.
///
/// Every operation is queued onto one dedicated worker thread and executed in
/// submission order, so a subscribe queued before an emit is always observed
/// by it. Callers never block: each operation returns a [`Pending`] (or a
/// [`Subscription`]) that resolves once the lane has run the task.
///
/// Cloning is cheap and yields another handle to the same lane. When the last
/// handle is dropped the bus shuts down as if [`EventBus::shutdown`] had been
/// called. Listeners that hold a clone of their own bus keep it open until an
/// explicit shutdown.
pub struct EventBus<K, T> {
    inner: Arc<Inner<K, T>>,
}

struct Inner<K, T> {
    tasks: Mutex<Option<mpsc::UnboundedSender<Task<K, T>>>>,
    lifecycle: Arc<Lifecycle>,
    lane_name: String,
    lane_thread: ThreadId,
}

impl<K, T> Inner<K, T> {
    fn close(&self) -> bool {
        let mut tasks = self.tasks.lock();
        let Some(sender) = tasks.take() else {
            return false;
        };
        // Draining must be visible before the lane can observe the closed queue.
        self.lifecycle.advance(BusState::Draining);
        drop(tasks);
        drop(sender);
        true
    }
}

impl<K, T> Drop for Inner<K, T> {
    fn drop(&mut self) {
        if self.close() {
            debug!(lane = %self.lane_name, "Last bus handle dropped; draining lane");
        }
    }
}

impl<K: EventKey, T: Payload> EventBus<K, T> {
    /// Creates a bus with default settings and starts its lane thread.
    ///
    /// # Errors
    /// Returns [`EventBusError::Spawn`] if the lane thread cannot be started.
    ///
    /// # Examples
    /// ```rust
    /// use lanebus_event_bus::EventBus;
    ///
    /// # fn main() -> Result<(), lanebus_event_bus::EventBusError> {
    /// let bus = EventBus::<&'static str, u64>::new()?;
    /// bus.shutdown();
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self, EventBusError> {
        Self::builder().build()
    }

    /// Returns a builder for configuring the lane before it starts.
    #[must_use = "The builder must be built to start the event lane."]
    pub fn builder() -> EventBusBuilder<K, T> {
        EventBusBuilder::new()
    }

    pub(crate) fn from_parts(
        tasks: mpsc::UnboundedSender<Task<K, T>>,
        lifecycle: Arc<Lifecycle>,
        lane_name: String,
        lane_thread: ThreadId,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(Some(tasks)),
                lifecycle,
                lane_name,
                lane_thread,
            }),
        }
    }

    /// Registers `callback` under `key`.
    ///
    /// The registration is appended after any existing listeners of `key`, so
    /// listeners run in subscription order. Registering the same callback
    /// twice yields two independent registrations with distinct handles.
    ///
    /// The returned [`Subscription`] resolves to the [`SubscriptionHandle`] of
    /// this registration, or to [`EventBusError::BusClosed`] after shutdown.
    ///
    /// # Examples
    /// ```rust
    /// use lanebus_event_bus::EventBus;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), lanebus_event_bus::EventBusError> {
    /// let bus = EventBus::<&'static str, String>::new()?;
    /// let handle = bus.subscribe("order.created", |id: &String| println!("created {id}")).await?;
    /// assert_eq!(*handle.key(), "order.created");
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self, key: K, callback: impl Callback<T> + 'static) -> Subscription<K> {
        let id = RegistrationId::next();
        let handle = SubscriptionHandle::new(key.clone(), id);
        let callback: Box<dyn Callback<T>> = Box::new(callback);
        let pending =
            self.submit("subscribe", |reply| Task::Subscribe { key, id, callback, reply });
        Subscription::new(handle, pending)
    }

    /// Removes exactly the registration named by `handle`.
    ///
    /// Accepts a resolved [`SubscriptionHandle`] or a still-pending
    /// [`Subscription`]. Resolves to `true` if the registration existed and was
    /// removed, `false` if it was already gone.
    ///
    /// # Examples
    /// ```rust
    /// use lanebus_event_bus::EventBus;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), lanebus_event_bus::EventBusError> {
    /// let bus = EventBus::<&'static str, u32>::new()?;
    /// let subscription = bus.subscribe("tick", |_: &u32| {});
    /// assert!(bus.unsubscribe(&subscription).await?);
    /// assert!(!bus.unsubscribe(&subscription).await?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn unsubscribe(&self, handle: impl AsRef<SubscriptionHandle<K>>) -> Pending<bool> {
        let handle = handle.as_ref().clone();
        self.submit("unsubscribe", |reply| Task::Unsubscribe { handle, reply })
    }

    /// Delivers `payload` to every listener registered under `key` when the
    /// task reaches the lane.
    ///
    /// Resolves to `true` if there was at least one listener and all of them
    /// completed; `false` if there were none or any listener failed. A failing
    /// listener never prevents delivery to the ones after it.
    ///
    /// # Examples
    /// ```rust
    /// use lanebus_event_bus::EventBus;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), lanebus_event_bus::EventBusError> {
    /// let bus = EventBus::<&'static str, u32>::new()?;
    /// assert!(!bus.emit("tick", 1).await?, "no listeners yet");
    ///
    /// let _sub = bus.subscribe("tick", |_: &u32| {});
    /// assert!(bus.emit("tick", 2).await?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn emit(&self, key: K, payload: T) -> Pending<bool> {
        self.submit("emit", |reply| Task::Emit { key, payload, reply })
    }

    /// Number of listeners registered under `key` once all earlier tasks have run.
    pub fn listener_count(&self, key: K) -> Pending<usize> {
        self.submit("listener_count", |reply| Task::ListenerCount { key, reply })
    }

    fn submit<R>(
        &self,
        operation: &'static str,
        task: impl FnOnce(oneshot::Sender<R>) -> Task<K, T>,
    ) -> Pending<R> {
        let tasks = self.inner.tasks.lock();
        let Some(sender) = tasks.as_ref() else {
            return Pending::rejected(EventBusError::closed(operation));
        };
        let (reply, receiver) = oneshot::channel();
        if sender.send(task(reply)).is_err() {
            return Pending::rejected(EventBusError::closed(operation));
        }
        Pending::queued(receiver, operation, self.inner.lane_thread)
    }
}

impl<K, T> EventBus<K, T> {
    /// Stops accepting new tasks; already queued tasks still run.
    ///
    /// Returns immediately. Calling it more than once has no further effect.
    pub fn shutdown(&self) {
        if self.inner.close() {
            debug!(lane = %self.inner.lane_name, "Event bus shutdown requested");
        }
    }

    /// Requests shutdown and blocks until the lane has drained and exited.
    ///
    /// Returns `Ok(true)` once the lane has terminated, `Ok(false)` if
    /// `timeout` elapsed first.
    ///
    /// # Errors
    /// Returns [`EventBusError::InterruptedWait`] if called from a listener
    /// (the lane cannot wait for itself) or if the lane thread ended abnormally.
    ///
    /// # Examples
    /// ```rust
    /// use lanebus_event_bus::EventBus;
    /// use std::time::Duration;
    ///
    /// # fn main() -> Result<(), lanebus_event_bus::EventBusError> {
    /// let bus = EventBus::<u8, u8>::new()?;
    /// assert!(bus.shutdown_and_wait(Duration::from_secs(5))?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn shutdown_and_wait(&self, timeout: Duration) -> Result<bool, EventBusError> {
        self.shutdown();

        if std::thread::current().id() == self.inner.lane_thread {
            return Err(EventBusError::InterruptedWait {
                message: "the lane cannot wait for its own termination".into(),
                context: Some(self.inner.lane_name.clone().into()),
            });
        }

        match self.inner.lifecycle.wait_for_exit(timeout) {
            None => Ok(false),
            Some(LaneExit::Drained) => Ok(true),
            Some(LaneExit::Panicked) => Err(EventBusError::InterruptedWait {
                message: "lane thread terminated abnormally".into(),
                context: Some(self.inner.lane_name.clone().into()),
            }),
        }
    }

    /// Resolves once the lane has drained and exited.
    ///
    /// Does not itself request shutdown.
    pub async fn closed(&self) {
        self.inner.lifecycle.closed().await;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BusState {
        self.inner.lifecycle.current()
    }

    /// Name of the lane thread.
    #[must_use]
    pub fn lane_name(&self) -> &str {
        &self.inner.lane_name
    }
}

impl<K, T> Clone for EventBus<K, T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, T> fmt::Debug for EventBus<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("lane", &self.inner.lane_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
