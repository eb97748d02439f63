//! Ephemeral-artifact expiry scheduling.
//!
//! This crate provides:
//! - A keyed registry of one-shot, cancellable deletion timers
//! - The expiry policy deciding how long uploads stay available
//! - A lifecycle coordinator tying successful uploads to delayed deletions
//! - An observer seam reporting fire and cancel outcomes

pub mod coordinator;
pub mod key;
pub mod observer;
pub mod policy;
pub mod registry;

pub use coordinator::{LifecycleCoordinator, ObjectDeleter};
pub use key::ArtifactKey;
pub use observer::{ExpiryObserver, NoopObserver};
pub use policy::{ExpiryPolicy, DEFAULT_EXPIRY};
pub use registry::{JobHandle, TimerRegistry};
