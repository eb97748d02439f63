//! Video fetching using yt-dlp.
//!
//! Invokes yt-dlp to pull a video from a supported site into a local file.
//! Format selection is passed through opaquely; picking one is the caller's
//! concern.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Environment variable naming a Netscape-format cookies file passed to
/// yt-dlp, for sites that gate downloads behind a logged-in session.
pub const COOKIES_FILE_ENV: &str = "YTDLP_COOKIES_FILE";

/// Resolve the cookies file to hand yt-dlp, if one is configured and
/// actually present on disk.
pub fn cookies_file() -> Option<PathBuf> {
    let path = match std::env::var(COOKIES_FILE_ENV) {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => return None,
    };

    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > 0 => {
            debug!("Using cookies file {}", path.display());
            Some(path)
        }
        Ok(_) => {
            warn!("Cookies file {} is empty, skipping", path.display());
            None
        }
        Err(e) => {
            warn!("Cookies file {} not readable: {}", path.display(), e);
            None
        }
    }
}

/// Build the yt-dlp argument list for a fetch.
///
/// Kept separate from the invocation so the flag set is testable without
/// running the tool.
fn fetch_args(
    url: &str,
    format: Option<&str>,
    output_path: &Path,
    cookies: Option<&Path>,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--embed-thumbnail".to_string(),
        "--add-metadata".to_string(),
        "--audio-quality".to_string(),
        "0".to_string(),
    ];

    if let Some(f) = format {
        args.push("-f".to_string());
        args.push(f.to_string());
    }

    if let Some(cp) = cookies {
        args.push("--cookies".to_string());
        args.push(cp.to_string_lossy().to_string());
    }

    args.push("-o".to_string());
    args.push(output_path.to_string_lossy().to_string());
    args.push(url.to_string());
    args
}

/// Fetch a video from `url` into `output_path` using yt-dlp.
///
/// # Arguments
///
/// * `url` - Video URL (YouTube, Vimeo, etc.)
/// * `format` - Optional yt-dlp format selector, passed through verbatim
/// * `output_path` - Exact path to write the merged mp4 to
///
/// # Returns
///
/// - `Ok(())` once the file exists at `output_path`
/// - `Err(MediaError)` on tool absence, a non-zero exit, or a missing file
pub async fn fetch_video(
    url: &str,
    format: Option<&str>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();

    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    info!("Fetching video from {} to {}", url, output_path.display());

    let cookies = cookies_file();
    let args = fetch_args(url, format, output_path, cookies.as_deref());

    let output = Command::new("yt-dlp")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);

        let error_msg = stderr.lines().last().unwrap_or("Unknown error");
        return Err(MediaError::fetch_failed(format!(
            "yt-dlp failed: {}",
            error_msg
        )));
    }

    if !output_path.exists() {
        return Err(MediaError::OutputMissing(output_path.to_path_buf()));
    }

    let file_size = output_path.metadata()?.len();
    info!(
        output = %output_path.display(),
        size_mb = file_size as f64 / (1024.0 * 1024.0),
        "Fetched video successfully"
    );

    Ok(())
}
