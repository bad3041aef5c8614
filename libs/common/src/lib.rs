//! Common ambient concerns shared by the engine: structured logging
//! bootstrap, the injected clock seam, and application configuration.

pub mod clock;
pub mod config;
pub mod telemetry;

pub use clock::{system_clock, Clock, FixedClock, SystemClock};
pub use config::{ConfigError, PublisherConfig, StoreConfig, StrataConfig};
pub use telemetry::init_tracing;
