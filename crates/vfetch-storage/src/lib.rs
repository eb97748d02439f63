//! S3-compatible storage client for downloaded videos.
//!
//! This crate provides:
//! - File upload to the video bucket
//! - Object download with range support
//! - Object deletion
//! - Connectivity checks for readiness probes

pub mod client;
pub mod error;

pub use client::{ObjectDownload, StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
