#![allow(dead_code)]

use lanebus_event_bus::EventBus;
use lanebus_logger::{LevelFilter, Logger};
use std::sync::{Arc, Mutex, Once};

pub type OrderBus = EventBus<&'static str, OrderEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    pub order_id: u64,
}

impl OrderEvent {
    pub const fn new(order_id: u64) -> Self {
        Self { order_id }
    }
}

/// Installs a test-captured subscriber once per test binary.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = Logger::builder()
            .level(LevelFilter::DEBUG)
            .env_filter("lanebus_event_bus=debug")
            .test_writer(true)
            .init();
    });
}

pub fn order_bus() -> OrderBus {
    init_logging();
    EventBus::builder().lane_name("order-events").build().expect("bus should start")
}

/// Records which listener saw which order, in invocation order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<(&'static str, u64)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable listener that records under `label`.
    pub fn listener(&self, label: &'static str) -> impl Fn(&OrderEvent) + Clone + Send + 'static {
        let calls = Arc::clone(&self.calls);
        move |event: &OrderEvent| calls.lock().unwrap().push((label, event.order_id))
    }

    /// A listener that records under `label` and then reports an error.
    pub fn failing(
        &self,
        label: &'static str,
    ) -> impl Fn(&OrderEvent) -> Result<(), String> + Send + 'static {
        let calls = Arc::clone(&self.calls);
        move |event: &OrderEvent| {
            calls.lock().unwrap().push((label, event.order_id));
            Err(format!("{label} rejected order {}", event.order_id))
        }
    }

    pub fn calls(&self) -> Vec<(&'static str, u64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|(label, _)| label).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}
