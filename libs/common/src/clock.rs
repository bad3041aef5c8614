//! Injected clock seam (§9: "the configuration, store handles, and publisher
//! handles are process-wide singletons... expose them through an explicit
//! injection seam so tests can substitute fakes").

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// A source of current time, injected everywhere the engine needs `now()`
/// instead of calling `Utc::now()` directly, so tests can hold time still.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// A clock that can be advanced manually, for deterministic tests of
/// retry delays, approval expiry, and instance timeouts.
#[derive(Debug, Clone)]
pub struct FixedClock {
    inner: Arc<std::sync::Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock().expect("clock mutex poisoned");
        *guard += chrono::Duration::from_std(by).expect("duration fits in chrono::Duration");
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().expect("clock mutex poisoned")
    }
}
