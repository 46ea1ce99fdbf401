use crate::bus::{EventBus, EventKey, Payload};
use crate::error::{EventBusError, EventBusErrorExt};
use crate::lane::{Lane, Lifecycle};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const DEFAULT_LANE_NAME: &str = "lanebus-lane";
/// Minimum allowed lane stack size (64 `KiB`).
const MIN_STACK_SIZE: usize = 64 * 1024;
/// Maximum allowed lane stack size (16 `MiB`).
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
struct LaneConfig {
    name: String,
    stack_size: Option<usize>,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self { name: DEFAULT_LANE_NAME.to_owned(), stack_size: None }
    }
}

/// Configures and starts an [`EventBus`].
///
/// # Examples
/// ```rust
/// use lanebus_event_bus::EventBus;
///
/// # fn main() -> Result<(), lanebus_event_bus::EventBusError> {
/// let bus = EventBus::<String, Vec<u8>>::builder()
///     .lane_name("ingest-events")
///     .stack_size(256 * 1024)
///     .build()?;
/// assert_eq!(bus.lane_name(), "ingest-events");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EventBusBuilder<K, T> {
    config: LaneConfig,
    bus: PhantomData<fn() -> (K, T)>,
}

impl<K: EventKey, T: Payload> EventBusBuilder<K, T> {
    pub(crate) fn new() -> Self {
        Self { config: LaneConfig::default(), bus: PhantomData }
    }

    /// Names the lane thread (shown in logs, debuggers and panic messages).
    #[must_use = "The builder must be built to start the event lane."]
    pub fn lane_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the lane thread's stack size, clamped to 64 `KiB`..=16 `MiB`.
    #[must_use = "The builder must be built to start the event lane."]
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE));
        self
    }

    /// Spawns the lane thread and returns the bus handle.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidConfiguration`] for an empty lane name,
    /// or [`EventBusError::Spawn`] if the thread cannot be started.
    pub fn build(self) -> Result<EventBus<K, T>, EventBusError> {
        let LaneConfig { name, stack_size } = self.config;
        if name.trim().is_empty() {
            return Err(EventBusError::InvalidConfiguration {
                message: "lane name cannot be empty".into(),
                context: None,
            });
        }

        let (tasks, queue) = mpsc::unbounded_channel();
        let lifecycle = Arc::new(Lifecycle::new());
        let lane = Lane::new(name.clone(), queue, Arc::clone(&lifecycle));

        let mut thread = std::thread::Builder::new().name(name.clone());
        if let Some(bytes) = stack_size {
            thread = thread.stack_size(bytes);
        }
        let handle = thread
            .spawn(move || lane.run())
            .context(format!("Failed to start lane thread '{name}'"))?;
        let lane_thread = handle.thread().id();
        debug!(lane = %name, ?stack_size, "Event bus created");

        Ok(EventBus::from_parts(tasks, lifecycle, name, lane_thread))
    }
}
