//! yt-dlp subprocess wrapper.
//!
//! Narrow surface: fetch a URL into a local mp4, nothing else. Format
//! listing and selection UIs live elsewhere.

pub mod error;
pub mod fetch;

pub use error::{MediaError, MediaResult};
pub use fetch::{cookies_file, fetch_video, COOKIES_FILE_ENV};
