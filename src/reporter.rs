use crate::ocr_client::OcrResponse;
use crate::preview::PreviewState;
use crate::workflow::{UiStatus, WorkflowSnapshot};
use crate::AppResult;
use console::{Style, Term};
use indicatif::{HumanBytes, ProgressBar};
use rvstruct::ValueStruct;

#[derive(Debug, Clone)]
pub struct AppReporter<'a> {
    inner: AppReporterInner<'a>,
}

impl<'a> AppReporter<'a> {
    pub fn report<S>(&self, message: S) -> AppResult<()>
    where
        S: AsRef<str>,
    {
        match &self.inner {
            AppReporterInner::Term(term) => Ok(term.write_line(message.as_ref())?),
            AppReporterInner::ProgressBar(progress_bar) => {
                progress_bar.println(message.as_ref());
                Ok(())
            }
            #[cfg(test)]
            AppReporterInner::Captured(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(console::strip_ansi_codes(message.as_ref()).to_string());
                }
                Ok(())
            }
        }
    }

    pub fn report_snapshot(&self, snapshot: &WorkflowSnapshot) -> AppResult<()> {
        let file = snapshot
            .selected
            .as_ref()
            .map(|name| name.value().clone())
            .unwrap_or_else(|| "<no file>".to_string());
        self.report(format!(
            "[{}] {}",
            Style::new().bold().white().apply_to(file),
            format_status(&snapshot.status)
        ))?;
        if matches!(snapshot.status, UiStatus::Idle) && snapshot.selected.is_some() {
            self.report(format!("  ↳ {}", format_preview(&snapshot.preview)))?;
        }
        if snapshot.selected.is_some()
            && !snapshot.can_submit
            && !matches!(snapshot.status, UiStatus::Submitting)
        {
            self.report(format!(
                "  ↳ {}",
                Style::new()
                    .dim()
                    .apply_to("waiting for an earlier OCR request to finish")
            ))?;
        }
        Ok(())
    }

    pub fn report_response(&self, response: &OcrResponse) -> AppResult<()> {
        match response {
            OcrResponse::Recognized { text } if text.is_empty() => self.report(
                Style::new()
                    .yellow()
                    .apply_to("Nothing was recognized in the image.")
                    .to_string(),
            ),
            OcrResponse::Recognized { text } => self.report(text),
            _ => self.report(format_response(response)),
        }
    }
}

pub fn format_status(status: &UiStatus) -> String {
    let dimmed_style = Style::new().dim();
    match status {
        UiStatus::Idle => dimmed_style.apply_to("idle").to_string(),
        UiStatus::Previewing => dimmed_style.apply_to("rendering preview…").to_string(),
        UiStatus::Submitting => Style::new()
            .cyan()
            .apply_to("submitting to OCR service…")
            .to_string(),
        UiStatus::Done(response) => format_response(response),
    }
}

pub fn format_response(response: &OcrResponse) -> String {
    let bold_style = Style::new().bold();
    match response {
        OcrResponse::Recognized { text } => format!(
            "{} ({} characters)",
            bold_style.clone().green().apply_to("✓ Recognized"),
            text.chars().count()
        ),
        OcrResponse::ServiceError { message } => format!(
            "{}: {}",
            bold_style.clone().red().apply_to("✗ OCR service error"),
            message
        ),
        OcrResponse::TransportError { message } => format!(
            "{}: {}",
            bold_style.clone().red().apply_to("✗ Transport error"),
            message
        ),
    }
}

pub fn format_preview(preview: &PreviewState) -> String {
    match preview {
        PreviewState::Empty => Style::new()
            .yellow()
            .apply_to("no preview available")
            .to_string(),
        PreviewState::Ready {
            data_url,
            media_type,
            size,
        } => format!(
            "preview ready: {}, {} ({} characters data URL)",
            media_type,
            HumanBytes(*size as u64),
            data_url.value().len()
        ),
    }
}

#[derive(Debug, Clone)]
enum AppReporterInner<'a> {
    Term(&'a Term),
    ProgressBar(&'a ProgressBar),
    #[cfg(test)]
    Captured(&'a std::sync::Mutex<Vec<String>>),
}

impl<'a> From<&'a Term> for AppReporter<'a> {
    fn from(term: &'a Term) -> Self {
        AppReporter {
            inner: AppReporterInner::Term(term),
        }
    }
}

impl<'a> From<&'a ProgressBar> for AppReporter<'a> {
    fn from(progress_bar: &'a ProgressBar) -> Self {
        AppReporter {
            inner: AppReporterInner::ProgressBar(progress_bar),
        }
    }
}

#[cfg(test)]
impl<'a> From<&'a std::sync::Mutex<Vec<String>>> for AppReporter<'a> {
    fn from(lines: &'a std::sync::Mutex<Vec<String>>) -> Self {
        AppReporter {
            inner: AppReporterInner::Captured(lines),
        }
    }
}
