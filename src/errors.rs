use indicatif::style::TemplateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file is selected. Select an image before submitting it")]
    NoFileSelected,
    #[error("A submission for '{display_name}' is already in flight")]
    SubmissionInFlight { display_name: String },
    #[error("Unable to read '{file_path}': {source}")]
    UnreadableFile {
        file_path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Workflow is not running anymore")]
    WorkflowStopped,
    #[error("Input/output error")]
    InputOutputError(#[from] std::io::Error),
    #[error("Invalid OCR endpoint URL: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("HTTP client error:\n{0}")]
    HttpClientError(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    TemplateError(#[from] TemplateError),
    #[error("OCR config error: {message}")]
    OcrConfigError { message: String },
    #[error("System error: {message}")]
    SystemError { message: String },
}
