use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::Serialize;

/// Snapshot returned by [`HealthMonitor::report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub consumer_alive: bool,
    pub engine_initialized: bool,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// Liveness flags shared between the consumer loop and whoever reports health.
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    consumer_alive: Arc<AtomicBool>,
    engine_initialized: Arc<AtomicBool>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_consumer_alive(&self, alive: bool) {
        self.consumer_alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_engine_initialized(&self, initialized: bool) {
        self.engine_initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn report(&self) -> HealthReport {
        let consumer_alive = self.consumer_alive.load(Ordering::SeqCst);
        let engine_initialized = self.engine_initialized.load(Ordering::SeqCst);
        HealthReport {
            status: if consumer_alive && engine_initialized {
                "OK"
            } else {
                "ERROR"
            },
            consumer_alive,
            engine_initialized,
        }
    }
}
