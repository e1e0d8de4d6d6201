use clap::Parser;
use console::{Style, Term};

use std::error::Error;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod args;
use crate::commands::*;
use crate::errors::AppError;
use args::*;

mod reporter;

mod errors;

mod commands;

mod common_types;

mod file_selection;

mod preview;

mod ocr_client;

mod workflow;

#[cfg(test)]
mod test_support;

pub type AppResult<T> = Result<T, AppError>;

pub fn config_env_var(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|e| format!("{}: {}", name, e))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();
    let term = Term::stdout();
    let bold_style = Style::new().bold();

    let cli = CliArgs::parse();
    let quiet = matches!(cli.command, CliCommand::Recognize { json: true, .. });
    if !quiet {
        term.write_line(
            format!(
                "{} v{}",
                bold_style.clone().green().apply_to("OCR flow"),
                bold_style.apply_to(env!("CARGO_PKG_VERSION"))
            )
            .as_str(),
        )?;
    }

    match handle_args(cli, &term).await {
        Ok(exit_code) => Ok(exit_code),
        Err(err) => {
            Term::stderr().write_line(
                format!(
                    "{}: {}\nDetails: {:?}",
                    bold_style.clone().red().apply_to("Error"),
                    err,
                    err.source()
                )
                .as_str(),
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn handle_args(cli: CliArgs, term: &Term) -> AppResult<ExitCode> {
    match cli.command {
        CliCommand::Recognize {
            file,
            endpoint_args,
            max_preview_size,
            json,
            no_preview,
        } => {
            let options = RecognizeCommandOptions {
                client_options: endpoint_args.try_into()?,
                max_preview_size,
                json_output: json,
                wait_for_preview: !no_preview,
            };
            let result = command_recognize(term, &file, options).await?;
            Ok(if result.response.is_recognized() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        CliCommand::Preview {
            file,
            max_preview_size,
            data_url,
        } => {
            let preview = command_preview(
                term,
                &file,
                PreviewCommandOptions {
                    max_preview_size,
                    print_data_url: data_url,
                },
            )
            .await?;
            Ok(if preview.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        CliCommand::Session {
            endpoint_args,
            max_preview_size,
        } => {
            command_session(
                term,
                SessionCommandOptions {
                    client_options: endpoint_args.try_into()?,
                    max_preview_size,
                },
            )
            .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
