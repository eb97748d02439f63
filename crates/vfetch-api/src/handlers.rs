//! Request handlers.

pub mod downloads;
pub mod health;
pub mod jobs;

pub use downloads::*;
pub use health::*;
pub use jobs::*;
