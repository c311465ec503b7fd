//! Impls - ResultContext implementations beyond the inline default.

pub mod event_loop;

pub use self::event_loop::{EventLoopContext, EventLoopError};
