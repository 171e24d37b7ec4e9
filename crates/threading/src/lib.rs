//! Threading primitives for the context manager.
//!
//! - [`Executor`]: one dedicated worker thread running submitted jobs strictly
//!   in submission order.
//! - [`MultiTimer`]: one dedicated thread firing delayed callbacks, each
//!   cancellable by token.

mod error;
mod executor;
mod timer;

pub use error::{ExecutorError, TimerError};
pub use executor::Executor;
pub use timer::{MultiTimer, TimerToken};
