//! Decorators over the `MessageSource` port.

pub mod throttled;

pub use throttled::{ThrottleConfig, ThrottledSource};
