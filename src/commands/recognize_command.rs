use crate::errors::AppError;
use crate::file_selection::SelectedFile;
use crate::ocr_client::{HttpOcrClient, HttpOcrClientOptions, OcrResponse};
use crate::preview::DataUrlPreviewRenderer;
use crate::reporter::{format_preview, AppReporter};
use crate::workflow::{workflow, UiStatus, WorkflowHandle};
use crate::AppResult;
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use rvstruct::ValueStruct;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecognizeCommandOptions {
    pub client_options: HttpOcrClientOptions,
    pub max_preview_size: Option<u64>,
    pub json_output: bool,
    pub wait_for_preview: bool,
}

pub struct RecognizeCommandResult {
    pub response: OcrResponse,
}

pub async fn command_recognize(
    term: &Term,
    file: &Path,
    options: RecognizeCommandOptions,
) -> AppResult<RecognizeCommandResult> {
    let bold_style = Style::new().bold();
    let selected_file = SelectedFile::from_path(file);
    if !options.json_output {
        term.write_line(
            format!(
                "Recognizing {} ({}) using {}.",
                bold_style.clone().white().apply_to(file.display()),
                selected_file.media_type,
                bold_style.clone().yellow().apply_to(&options.client_options.endpoint)
            )
            .as_str(),
        )?;
    }

    let bar = if options.json_output {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {msg}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(100));
    let app_reporter = AppReporter::from(&bar);

    let client = HttpOcrClient::new(options.client_options.clone())?;
    let renderer = DataUrlPreviewRenderer::new(options.max_preview_size);
    let (runner, handle) = workflow(renderer, client);

    let drive = async {
        let result =
            recognize_selected(&handle, selected_file, &options, &bar, &app_reporter).await;
        handle.shutdown();
        result
    };
    let (run_result, response) = tokio::join!(runner.run(), drive);
    bar.finish_and_clear();
    run_result?;
    let response = response?;

    if options.json_output {
        term.write_line(serde_json::to_string_pretty(&response)?.as_str())?;
    } else {
        AppReporter::from(term).report_response(&response)?;
    }
    Ok(RecognizeCommandResult { response })
}

async fn recognize_selected(
    handle: &WorkflowHandle,
    selected_file: SelectedFile,
    options: &RecognizeCommandOptions,
    bar: &ProgressBar,
    reporter: &AppReporter<'_>,
) -> AppResult<OcrResponse> {
    let display_name = selected_file.display_name.value().clone();
    bar.set_message(format!("Rendering preview of {display_name}"));
    let generation = handle.select(Some(selected_file)).await?;
    if options.wait_for_preview {
        let previewed = handle.wait_previewed(generation).await?;
        reporter.report(format!("↳ {}", format_preview(&previewed.preview)))?;
    }

    bar.set_message(format!("Submitting {display_name}"));
    handle.submit().await?;
    let done = handle.wait_done(generation).await?;
    match done.status {
        UiStatus::Done(response) if done.generation == generation => Ok(response),
        _ => Err(AppError::SystemError {
            message: format!("Selection of {display_name} was replaced before completion"),
        }),
    }
}
