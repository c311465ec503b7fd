//! Domain model: lifecycle status, run outcome, error taxonomy and run ids.

pub mod errors;
pub mod ids;
pub mod status;

pub use self::errors::{
    BoxError, ErrorIdentifier, PanicFailure, RegistryError, TaskError, TaskErrorKind,
    format_message,
};
pub use self::ids::RunId;
pub use self::status::{TaskEndStatus, TaskStatus};
