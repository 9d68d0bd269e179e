//! Sample picture storage on the local filesystem.
//!
//! Uploaded files are named `{code}_{unix millis}{ext}` and served under
//! `/images/`. Replaced pictures are removed best effort; the placeholder
//! picture is never touched.

use std::path::{Path, PathBuf};

use thiserror::Error;

use sample_depot_core::is_custom_image;

/// Public URL prefix of stored pictures.
pub const IMAGE_URL_PREFIX: &str = "/images/";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("empty upload")]
    Empty,

    #[error("image storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory-backed picture store.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for an upload of `original` attached to sample `code`.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedType` unless the original name carries
    /// a known picture extension.
    pub fn file_name_for(code: &str, original: &str, millis: i64) -> Result<String, ImageError> {
        let ext = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| ImageError::UnsupportedType(original.to_owned()))?;

        let stem: String = code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        Ok(format!("{stem}_{millis}.{ext}"))
    }

    /// Write an upload and return its public path.
    ///
    /// # Errors
    ///
    /// Returns `ImageError` for empty or unsupported uploads and write failures.
    pub async fn save(&self, code: &str, original: &str, bytes: &[u8]) -> Result<String, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let name = Self::file_name_for(code, original, chrono::Utc::now().timestamp_millis())?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        tracing::debug!(file = %name, size = bytes.len(), "Image stored");
        Ok(format!("{IMAGE_URL_PREFIX}{name}"))
    }

    /// Delete a previously stored picture. Failures are logged, not returned.
    pub async fn remove(&self, image: &str) {
        let Some(path) = self.path_of(image) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove old image");
        }
    }

    /// On-disk path of an uploaded picture; `None` for the placeholder.
    fn path_of(&self, image: &str) -> Option<PathBuf> {
        if !is_custom_image(image) {
            return None;
        }
        // only the file name is trusted
        let name = Path::new(image).file_name()?;
        Some(self.dir.join(name))
    }
}
