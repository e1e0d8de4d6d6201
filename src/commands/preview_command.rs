use crate::file_selection::SelectedFile;
use crate::preview::{DataUrlPreviewRenderer, PreviewRenderer, PreviewState};
use crate::reporter::format_preview;
use crate::AppResult;
use console::{Style, Term};
use rvstruct::ValueStruct;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PreviewCommandOptions {
    pub max_preview_size: Option<u64>,
    pub print_data_url: bool,
}

pub async fn command_preview(
    term: &Term,
    file: &Path,
    options: PreviewCommandOptions,
) -> AppResult<PreviewState> {
    let renderer = DataUrlPreviewRenderer::new(options.max_preview_size);
    let selected_file = SelectedFile::from_path(file);
    let preview = renderer.render(&selected_file).await;

    match (&preview, options.print_data_url) {
        (PreviewState::Ready { data_url, .. }, true) => {
            term.write_line(data_url.value())?;
        }
        _ => {
            term.write_line(
                format!(
                    "{}: {}",
                    Style::new()
                        .bold()
                        .white()
                        .apply_to(selected_file.display_name.value()),
                    format_preview(&preview)
                )
                .as_str(),
            )?;
        }
    }
    Ok(preview)
}
