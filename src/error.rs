use thiserror::Error;

/// Errors reported by the throttler itself.
///
/// A task body that fails in its own terms returns that failure inside its output
/// (for example `Result<T, E>`), which is delivered to the caller untouched. The
/// variants here only cover outcomes the body could not report on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
  #[error("Throttled task panicked during execution")]
  TaskPanicked,
}
