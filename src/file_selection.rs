use crate::common_types::{DisplayName, SelectionGeneration};
use crate::errors::AppError;
use crate::AppResult;
use bytes::Bytes;
use mime::Mime;
use rvstruct::ValueStruct;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    #[cfg(test)]
    Memory(Bytes),
}

/// A user-chosen image. Content is only read when somebody needs the bytes,
/// so a file may turn out to be unreadable long after it was selected.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub source: FileSource,
    pub media_type: Mime,
    pub display_name: DisplayName,
}

impl SelectedFile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        SelectedFile {
            source: FileSource::Path(path.to_path_buf()),
            media_type: mime_guess::from_path(path).first_or_octet_stream(),
            display_name: display_name.into(),
        }
    }

    #[cfg(test)]
    pub fn from_bytes<S: Into<String>>(display_name: S, media_type: Mime, content: Bytes) -> Self {
        let display_name: String = display_name.into();
        SelectedFile {
            source: FileSource::Memory(content),
            media_type,
            display_name: display_name.into(),
        }
    }

    pub async fn read_content(&self) -> AppResult<Bytes> {
        match &self.source {
            #[cfg(test)]
            FileSource::Memory(content) => Ok(content.clone()),
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| AppError::UnreadableFile {
                    file_path: path.to_string_lossy().to_string(),
                    source,
                }),
        }
    }

    pub fn is_image(&self) -> bool {
        self.media_type.type_() == mime::IMAGE
    }
}

/// Holds the current selection together with its generation.
#[derive(Debug, Clone)]
pub struct FileSelection {
    current: Option<SelectedFile>,
    generation: SelectionGeneration,
}

impl FileSelection {
    pub fn new() -> Self {
        FileSelection {
            current: None,
            generation: SelectionGeneration::INITIAL,
        }
    }

    /// Replaces the selection, clearing it on `None`. Any work started for
    /// the previous selection becomes stale.
    pub fn select(&mut self, file: Option<SelectedFile>) -> Option<&SelectedFile> {
        self.generation = self.generation.next();
        match &file {
            Some(selected) => {
                if !selected.is_image() {
                    warn!(
                        file = selected.display_name.value().as_str(),
                        media_type = %selected.media_type,
                        "Selected file doesn't look like an image, submitting it anyway"
                    );
                }
                debug!(
                    file = selected.display_name.value().as_str(),
                    generation = self.generation.value(),
                    "File selected"
                );
            }
            None => debug!(generation = self.generation.value(), "Selection cleared"),
        }
        self.current = file;
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&SelectedFile> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> SelectionGeneration {
        self.generation
    }

    pub fn is_current(&self, generation: SelectionGeneration) -> bool {
        self.generation == generation
    }
}

impl Default for FileSelection {
    fn default() -> Self {
        Self::new()
    }
}
