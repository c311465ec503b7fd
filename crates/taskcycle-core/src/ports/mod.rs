//! Ports - seams the host application plugs into.
//!
//! The engine decides *when* observers are notified; the host decides *where*
//! (which thread or event loop) those notifications run.

pub mod result_context;

pub use self::result_context::{Callback, InlineContext, ResultContext};
