//! # Event Bus
//!
//! An in-process, typed publish/subscribe bus whose registry is owned by a
//! single serialized worker, the *lane*.
//!
//! ## Overview
//!
//! Producers [`emit`](EventBus::emit) a payload under an event key; consumers
//! [`subscribe`](EventBus::subscribe) callbacks to a key. Subscribe, unsubscribe
//! and emit never touch the registry from the caller's thread: each becomes a
//! task on the lane's queue and the caller gets back a future that resolves when
//! the lane has run it.
//!
//! ## Features
//!
//! * **Strict ordering**: tasks run one at a time in FIFO order, so an emit sees
//!   every subscribe/unsubscribe queued before it and none queued after it.
//! * **Precise unsubscribe**: every subscribe call mints its own
//!   [`SubscriptionHandle`]; registering the same callback twice yields two
//!   independently removable entries.
//! * **Failure isolation**: a listener that returns an error or panics is logged
//!   and skipped; the remaining listeners still run and the emit resolves `false`.
//! * **Graceful shutdown**: [`EventBus::shutdown`] stops admission and lets the
//!   queue drain; [`EventBus::shutdown_and_wait`] blocks until the lane exits.
//! * **Runtime agnostic**: the lane is a plain OS thread; results are `tokio`
//!   oneshot futures that can be awaited anywhere or resolved with `wait()`.
//!
//! # Example
//!
//! ```rust
//! use lanebus_event_bus::{EventBus, EventBusError};
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::<&'static str, u64>::new()?;
//!     let seen = Arc::new(Mutex::new(Vec::new()));
//!
//!     let sink = Arc::clone(&seen);
//!     let subscription = bus.subscribe("order.created", move |id: &u64| {
//!         sink.lock().unwrap().push(*id);
//!     });
//!
//!     assert!(bus.emit("order.created", 42).await?);
//!     assert!(bus.unsubscribe(&subscription).await?);
//!     assert!(!bus.emit("order.created", 43).await?, "no listeners left");
//!
//!     assert_eq!(*seen.lock().unwrap(), vec![42]);
//!     Ok(())
//! }
//! ```

mod builder;
mod bus;
mod callback;
mod error;
mod handle;
mod lane;
mod pending;
mod registry;

pub use builder::EventBusBuilder;
pub use bus::{EventBus, EventKey, Payload};
pub use callback::{Callback, ListenerFailure, ListenerOutcome};
pub use error::{EventBusError, EventBusErrorExt};
pub use handle::{RegistrationId, Subscription, SubscriptionHandle};
pub use lane::BusState;
pub use pending::Pending;
