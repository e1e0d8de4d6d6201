use crate::common_types::PreviewDataUrl;
use crate::file_selection::SelectedFile;
use base64::{engine::general_purpose::STANDARD, Engine};
use mime::Mime;
use rvstruct::ValueStruct;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewState {
    Empty,
    Ready {
        data_url: PreviewDataUrl,
        media_type: Mime,
        size: usize,
    },
}

impl PreviewState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PreviewState::Ready { .. })
    }
}

pub trait PreviewRenderer {
    /// Never fails: an unreadable file renders as [`PreviewState::Empty`].
    async fn render(&self, file: &SelectedFile) -> PreviewState;
}

#[derive(Debug, Clone, Default)]
pub struct DataUrlPreviewRenderer {
    pub max_size_limit: Option<u64>,
}

impl DataUrlPreviewRenderer {
    pub fn new(max_size_limit: Option<u64>) -> Self {
        DataUrlPreviewRenderer { max_size_limit }
    }

    pub fn encode_data_url(media_type: &Mime, content: &[u8]) -> PreviewDataUrl {
        format!(
            "data:{};base64,{}",
            media_type.essence_str(),
            STANDARD.encode(content)
        )
        .into()
    }
}

impl PreviewRenderer for DataUrlPreviewRenderer {
    async fn render(&self, file: &SelectedFile) -> PreviewState {
        let content = match file.read_content().await {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    file = file.display_name.value().as_str(),
                    error = %err,
                    "Unable to render preview"
                );
                return PreviewState::Empty;
            }
        };

        if let Some(max_size_limit) = self.max_size_limit {
            if content.len() as u64 > max_size_limit {
                warn!(
                    file = file.display_name.value().as_str(),
                    size = content.len(),
                    max_size_limit,
                    "File is too large to preview"
                );
                return PreviewState::Empty;
            }
        }

        debug!(
            file = file.display_name.value().as_str(),
            size = content.len(),
            "Preview rendered"
        );
        PreviewState::Ready {
            data_url: Self::encode_data_url(&file.media_type, &content),
            media_type: file.media_type.clone(),
            size: content.len(),
        }
    }
}
