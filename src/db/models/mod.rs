//! Database models split into separate files.

pub mod delivery_job;
pub mod notification;

pub use self::delivery_job::*;
pub use self::notification::*;
