//! Staging directory layout.
//!
//! ```text
//! {root}/{source}/manifest.jsonl
//! {root}/{source}/images/{id}.{format}
//! ```

use crate::error::{ErrorKind, Result};
use crate::{SourceId, Staging};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// File name of a source's append-only record log.
pub const MANIFEST_FILE_NAME: &str = "manifest.jsonl";
/// Directory (relative to the source directory) holding staged images.
pub const IMAGES_DIR: &str = "images";

impl Staging {
    /// Create a handle on a staging root.
    ///
    /// Nothing is created on disk; source directories appear on their first
    /// write. The root may be relative, but it may not be empty or point at
    /// something other than a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        // Use non-async here; it's a one-off check when the handle is built
        // and not worth making the constructor async.
        if root.exists() && !root.is_dir() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self, source: &SourceId) -> PathBuf {
        self.root.join(source)
    }

    pub fn images_dir(&self, source: &SourceId) -> PathBuf {
        self.source_dir(source).join(IMAGES_DIR)
    }

    pub fn manifest_path(&self, source: &SourceId) -> PathBuf {
        self.source_dir(source).join(MANIFEST_FILE_NAME)
    }

    /// Absolute location of a staged image.
    ///
    /// Returns `None` for file names that are not a single plain component,
    /// which keeps a tampered manifest from pointing outside the images
    /// directory.
    pub fn image_path(&self, source: &SourceId, filename: &str) -> Option<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !filename.contains('\0') => {
                Some(self.images_dir(source).join(filename))
            },
            _ => None,
        }
    }

    /// Make sure the images directory (and therefore the source directory)
    /// exists.
    pub async fn ensure_directories(&self, source: &SourceId) -> Result<()> {
        let images = self.images_dir(source);
        Ok(fs::create_dir_all(&images).await.map_err(|e| ErrorKind::from_io(e, &images))?)
    }

    /// Write image bytes into the source's images directory, replacing any
    /// previous file of the same name.
    #[instrument(skip(self, data), fields(source = %source, size = data.len()))]
    pub async fn save_image(&self, source: &SourceId, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let Some(path) = self.image_path(source, filename) else {
            exn::bail!(ErrorKind::InvalidFilename(filename.to_string()));
        };
        self.ensure_directories(source).await?;
        fs::write(&path, data).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        Ok(path)
    }
}
