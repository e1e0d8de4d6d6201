use crate::errors::AppError;
use crate::file_selection::SelectedFile;
use crate::ocr_client::{HttpOcrClient, HttpOcrClientOptions, OcrClient};
use crate::preview::{DataUrlPreviewRenderer, PreviewRenderer};
use crate::reporter::AppReporter;
use crate::workflow::{workflow, UiStatus, WorkflowHandle, WorkflowRunner, WorkflowSnapshot};
use crate::AppResult;
use console::{Style, Term};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct SessionCommandOptions {
    pub client_options: HttpOcrClientOptions,
    pub max_preview_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Select(PathBuf),
    Clear,
    Submit,
    Status,
    Help,
    Quit,
}

impl std::str::FromStr for SessionCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (line, ""),
        };
        match (command, argument) {
            ("select" | "s", "") => Err("select needs a file path".to_string()),
            ("select" | "s", path) => Ok(SessionCommand::Select(PathBuf::from(path))),
            ("clear" | "c", "") => Ok(SessionCommand::Clear),
            ("submit" | "ocr", "") => Ok(SessionCommand::Submit),
            ("status" | "?", "") => Ok(SessionCommand::Status),
            ("help" | "h", "") => Ok(SessionCommand::Help),
            ("quit" | "exit" | "q", "") => Ok(SessionCommand::Quit),
            (unknown, _) => Err(format!("Unknown command: {unknown}")),
        }
    }
}

const SESSION_HELP: &str = "Commands: select <path>, clear, submit, status, help, quit";

pub async fn command_session(term: &Term, options: SessionCommandOptions) -> AppResult<()> {
    let bold_style = Style::new().bold();
    term.write_line(
        format!(
            "Interactive OCR session using {}.\n{}",
            bold_style.clone().yellow().apply_to(&options.client_options.endpoint),
            Style::new().dim().apply_to(SESSION_HELP)
        )
        .as_str(),
    )?;

    let client = HttpOcrClient::new(options.client_options)?;
    let renderer = DataUrlPreviewRenderer::new(options.max_preview_size);
    let (runner, handle) = workflow(renderer, client);
    let reporter = AppReporter::from(term);
    let input = BufReader::new(tokio::io::stdin());
    run_session(input, runner, handle, &reporter).await
}

async fn run_session<I, R, C>(
    input: I,
    runner: WorkflowRunner<R, C>,
    handle: WorkflowHandle,
    reporter: &AppReporter<'_>,
) -> AppResult<()>
where
    I: AsyncBufRead + Unpin,
    R: PreviewRenderer + Clone + 'static,
    C: OcrClient + Clone + 'static,
{
    let ui = async {
        let result = session_loop(input, &handle, reporter).await;
        handle.shutdown();
        result
    };
    let (run_result, ui_result) = tokio::join!(runner.run(), ui);
    run_result?;
    ui_result
}

/// Snapshots published while a command is awaited may be merged: only the
/// latest one is printed once the command returns.
async fn session_loop<I>(
    input: I,
    handle: &WorkflowHandle,
    reporter: &AppReporter<'_>,
) -> AppResult<()>
where
    I: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut snapshots = handle.subscribe();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<SessionCommand>() {
                    Ok(SessionCommand::Quit) => break,
                    Ok(command) => {
                        run_session_command(handle, reporter, command).await?;
                        if snapshots.has_changed().unwrap_or(false) {
                            report_latest(&mut snapshots, reporter)?;
                        }
                    }
                    Err(message) => reporter.report(
                        Style::new().red().apply_to(message).to_string(),
                    )?,
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                report_latest(&mut snapshots, reporter)?;
            }
        }
    }
    Ok(())
}

fn report_latest(
    snapshots: &mut watch::Receiver<WorkflowSnapshot>,
    reporter: &AppReporter<'_>,
) -> AppResult<()> {
    let snapshot = snapshots.borrow_and_update().clone();
    reporter.report_snapshot(&snapshot)?;
    if let UiStatus::Done(response) = &snapshot.status {
        reporter.report_response(response)?;
    }
    Ok(())
}

async fn run_session_command(
    handle: &WorkflowHandle,
    reporter: &AppReporter<'_>,
    command: SessionCommand,
) -> AppResult<()> {
    match command {
        SessionCommand::Select(path) => {
            handle.select(Some(SelectedFile::from_path(path))).await?;
        }
        SessionCommand::Clear => {
            handle.select(None).await?;
        }
        SessionCommand::Submit => match handle.submit().await {
            Err(err @ (AppError::NoFileSelected | AppError::SubmissionInFlight { .. })) => {
                reporter.report(Style::new().yellow().apply_to(err.to_string()).to_string())?;
            }
            other => other?,
        },
        SessionCommand::Status => {
            let snapshot = handle.snapshot();
            reporter.report_snapshot(&snapshot)?;
            if snapshot.can_submit {
                reporter.report(Style::new().dim().apply_to("  ↳ ready to submit").to_string())?;
            }
        }
        SessionCommand::Help => reporter.report(SESSION_HELP)?,
        SessionCommand::Quit => {}
    }
    Ok(())
}
