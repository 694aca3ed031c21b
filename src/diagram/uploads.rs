//! Output directory for uploaded images and rendered diagrams.
//!
//! Every thread owns one subdirectory of the root, so deleting a thread
//! removes its files. Image references handed to the vision model must
//! resolve inside the root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::diagram::errors::{DiagramError, DiagramResult};

/// Extensions accepted for chat images.
pub const ACCEPTED_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Route prefix the output directory is served under.
pub const FILES_ROUTE: &str = "/files";

const RENDERED_DIAGRAM: &str = "diagram.png";

/// A file written to the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedFile {
    /// Path relative to the root, with `/` separators.
    pub relative_path: String,
    /// Full path on disk.
    pub path: PathBuf,
}

impl SavedFile {
    /// URL the file is served at.
    #[must_use]
    pub fn public_url(&self) -> String {
        format!("{FILES_ROUTE}/{}", self.relative_path)
    }

    /// Path string usable as a thread's image reference.
    #[must_use]
    pub fn reference(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Writes uploads under one root directory.
#[derive(Clone, Debug)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Store rooted at `root`; directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save an uploaded chat image under a unique name in the thread's directory.
    ///
    /// # Errors
    /// - [`DiagramError::UnsupportedImageType`] unless the name ends in jpg, jpeg or png.
    /// - [`DiagramError::EmptyImage`] for an empty body.
    /// - [`DiagramError::Io`] if the file cannot be written.
    pub async fn save_image(
        &self,
        thread_id: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> DiagramResult<SavedFile> {
        if image_extension(original_name).is_none() {
            return Err(DiagramError::UnsupportedImageType(original_name.to_string()));
        }
        if bytes.is_empty() {
            return Err(DiagramError::EmptyImage);
        }

        let file_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(original_name));
        let saved = self.write(thread_id, &file_name, bytes).await?;
        info!(file = %saved.relative_path, bytes = bytes.len(), "image uploaded");
        Ok(saved)
    }

    /// Save the rendered PNG of a thread's diagram, replacing the previous one.
    ///
    /// # Errors
    /// Returns [`DiagramError::Io`] if the file cannot be written.
    pub async fn save_rendered(&self, thread_id: &str, png: &[u8]) -> DiagramResult<SavedFile> {
        self.write(thread_id, RENDERED_DIAGRAM, png).await
    }

    /// Delete every file of a thread. Returns whether anything was removed.
    ///
    /// # Errors
    /// Returns [`DiagramError::Io`] if the directory exists but cannot be removed.
    pub async fn remove_thread(&self, thread_id: &str) -> DiagramResult<bool> {
        let dir = self.root.join(sanitize_file_name(thread_id));
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Resolve `reference` to an accepted image file inside the root.
    ///
    /// Symlinks and `..` segments are resolved before the containment check.
    pub async fn resolve_image(&self, reference: &str) -> Option<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root).await.ok()?;
        let resolved = tokio::fs::canonicalize(reference).await.ok()?;

        if !resolved.starts_with(&root) {
            debug!(reference, "image reference outside the upload directory");
            return None;
        }
        image_extension(&resolved.to_string_lossy())?;

        let metadata = tokio::fs::metadata(&resolved).await.ok()?;
        metadata.is_file().then_some(resolved)
    }

    async fn write(&self, thread_id: &str, file_name: &str, bytes: &[u8]) -> DiagramResult<SavedFile> {
        let dir_name = sanitize_file_name(thread_id);
        let dir = self.root.join(&dir_name);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(SavedFile {
            relative_path: format!("{dir_name}/{file_name}"),
            path,
        })
    }
}

/// Accepted image extension of `name`, lowercased.
#[must_use]
pub fn image_extension(name: &str) -> Option<&'static str> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();
    ACCEPTED_IMAGE_EXTENSIONS
        .into_iter()
        .find(|accepted| *accepted == extension)
}

/// Last path component of `name` with anything outside `[A-Za-z0-9._-]` replaced.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
