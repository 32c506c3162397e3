//! File-system side of the Setup phase: pre-rendered slide page images, a
//! plain-text report and an optional presentation recording. PDF→image
//! rasterization is an external tool's job; this runtime takes the resulting
//! page images as a directory.

use crate::config::MAX_SLIDE_PAGES;
use anyhow::{Context, Result, bail};
use base64::Engine;
use std::fs;
use std::path::Path;

/// A presentation recording ready for the transcription request.
#[derive(Debug, Clone)]
pub struct RecordingUpload {
    pub base64: String,
    pub mime_type: &'static str,
}

/// Loads slide page images (PNG/JPEG) from a directory, ordered by filename,
/// capped at `MAX_SLIDE_PAGES`. Returns base64-encoded image bytes.
pub fn load_slides(dir: &Path) -> Result<Vec<String>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read slides directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()).map(str::to_lowercase),
                    Some(ref ext) if ext == "png" || ext == "jpg" || ext == "jpeg"
                )
        })
        .collect();
    paths.sort();

    if paths.len() > MAX_SLIDE_PAGES {
        tracing::warn!(
            "Deck has {} pages, analyzing the first {} only",
            paths.len(),
            MAX_SLIDE_PAGES
        );
        paths.truncate(MAX_SLIDE_PAGES);
    }

    let mut slides = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read slide image: {}", path.display()))?;
        slides.push(base64::engine::general_purpose::STANDARD.encode(&bytes));
    }
    if slides.is_empty() {
        bail!("No slide images (*.png, *.jpg) found in {}", dir.display());
    }
    Ok(slides)
}

/// Loads report text from a plain-text file.
pub fn load_report(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file: {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("Report file {} is empty", path.display());
    }
    Ok(text)
}

/// Loads an audio recording and declares its mime type from the extension.
/// Only the container types the transcription service accepts are allowed.
pub fn load_recording(path: &Path) -> Result<RecordingUpload> {
    let mime_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "audio/mp4",
        Some("m4a") => "audio/x-m4a",
        other => bail!(
            "Unsupported recording format {:?} (supported: wav, mp3, mp4, m4a)",
            other.unwrap_or("<none>")
        ),
    };
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read recording: {}", path.display()))?;
    Ok(RecordingUpload {
        base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type,
    })
}
