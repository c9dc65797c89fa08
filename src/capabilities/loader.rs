//! Document loading capability, keyed by file extension.
//!
//! Per-format text extraction (PDF, DOCX, …) is an external concern; the
//! crate consumes it only through [`DocumentLoader::load`]. The registry
//! ships with a plain-text loader for `txt` and `md` files so a corpus of
//! text documents works out of the box.

use std::path::Path;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::types::RagError;

/// Extracts raw text from one document file.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load `path` and return its extracted text.
    async fn load(&self, path: &Path) -> Result<String, RagError>;
}

/// Reads the file as UTF-8 text verbatim. Handles `txt` and `md`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextLoader;

#[async_trait]
impl DocumentLoader for PlainTextLoader {
    async fn load(&self, path: &Path) -> Result<String, RagError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Dispatches to a [`DocumentLoader`] based on the detected file extension.
pub struct LoaderRegistry {
    loaders: FxHashMap<String, Box<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut registry = Self {
            loaders: FxHashMap::default(),
        };
        registry.register("txt", PlainTextLoader);
        registry.register("md", PlainTextLoader);
        registry
    }
}

impl LoaderRegistry {
    /// Registry with only the built-in plain-text loaders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loader for `extension` (lowercased, without the dot),
    /// replacing any previous registration.
    pub fn register<L: DocumentLoader + 'static>(&mut self, extension: &str, loader: L) {
        self.loaders
            .insert(extension.to_ascii_lowercase(), Box::new(loader));
    }

    /// Extensions with a registered loader.
    #[must_use]
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.loaders.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Loads `path` through the loader registered for its extension.
    ///
    /// An unknown or missing extension is a per-file [`RagError::Validation`]
    /// so the ingestor can record it and keep going.
    pub async fn load(&self, path: &Path) -> Result<String, RagError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                RagError::Validation(format!("{} has no file extension", path.display()))
            })?;
        let loader = self.loaders.get(&extension).ok_or_else(|| {
            RagError::Validation(format!(
                "unsupported document format '.{extension}' for {}",
                path.display()
            ))
        })?;
        loader.load(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_extension_is_a_per_file_error() {
        let registry = LoaderRegistry::new();
        let err = registry.load(Path::new("report.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
        assert!(err.to_string().contains(".pdf"));
    }

    #[tokio::test]
    async fn extension_matching_is_case_insensitive() {
        let dir = std::env::temp_dir().join(format!("ragweave-loader-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("NOTES.TXT");
        tokio::fs::write(&path, "hello").await.unwrap();

        let registry = LoaderRegistry::new();
        assert_eq!(registry.load(&path).await.unwrap(), "hello");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn built_in_loaders_cover_text_formats() {
        let registry = LoaderRegistry::new();
        assert_eq!(registry.supported_extensions(), vec!["md", "txt"]);
    }
}
