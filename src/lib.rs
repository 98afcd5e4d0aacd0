//! A Tokio-based throttler that bounds concurrent futures across independently
//! sized, named pools, with order-preserving skip-scan admission and drain-on-abort.

mod config;
mod error;
mod executor;
mod handle;
mod pool;
mod task;
mod throttler;
mod wait_queue;

pub use config::{ThrottlerConfig, DEFAULT_CAPACITY};
pub use error::ThrottleError;
pub use handle::{DrainHandle, TaskHandle};
pub use pool::PoolSnapshot;
pub use task::{PoolKey, TaskStatus, TaskTypes};
pub use throttler::{Throttler, ThrottlerSnapshot};
