use crate::config_env_var;
use crate::errors::AppError;
use crate::ocr_client::HttpOcrClientOptions;
use clap::*;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    #[command(about = "Preview an image, submit it to the OCR service and print the recognized text")]
    Recognize {
        #[arg(help = "Image file to recognize such as /tmp/receipt.png")]
        file: PathBuf,

        #[command(flatten)]
        endpoint_args: EndpointArgs,

        #[arg(
            short = 'm',
            long,
            help = "Maximum size of files to preview in bytes. Larger files are submitted without a preview"
        )]
        max_preview_size: Option<u64>,

        #[arg(long, help = "Print the outcome as JSON", default_value = "false")]
        json: bool,

        #[arg(
            long,
            help = "Submit without waiting for the preview",
            default_value = "false"
        )]
        no_preview: bool,
    },
    #[command(about = "Render the preview of an image without submitting it")]
    Preview {
        #[arg(help = "Image file to preview such as /tmp/receipt.png")]
        file: PathBuf,

        #[arg(short = 'm', long, help = "Maximum size of files to preview in bytes")]
        max_preview_size: Option<u64>,

        #[arg(
            long,
            help = "Print the whole data URL instead of a summary",
            default_value = "false"
        )]
        data_url: bool,
    },
    #[command(
        about = "Interactive session: select, clear and submit files line by line from stdin"
    )]
    Session {
        #[command(flatten)]
        endpoint_args: EndpointArgs,

        #[arg(short = 'm', long, help = "Maximum size of files to preview in bytes")]
        max_preview_size: Option<u64>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    #[arg(
        short = 'e',
        long,
        help = "OCR endpoint such as http://127.0.0.1:5000/ocr. Defaults to OCRFLOW_ENDPOINT env variable or http://127.0.0.1:5000/ocr"
    )]
    pub endpoint: Option<Url>,

    #[arg(short = 't', long, help = "Request timeout in seconds")]
    pub timeout_secs: Option<u64>,
}

impl EndpointArgs {
    pub const ENDPOINT_ENV_VAR: &'static str = "OCRFLOW_ENDPOINT";
}

impl TryInto<HttpOcrClientOptions> for EndpointArgs {
    type Error = AppError;

    fn try_into(self) -> Result<HttpOcrClientOptions, Self::Error> {
        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => match config_env_var(Self::ENDPOINT_ENV_VAR).ok() {
                Some(value) => Url::parse(value.trim())?,
                None => Url::parse(HttpOcrClientOptions::DEFAULT_ENDPOINT)?,
            },
        };
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(AppError::OcrConfigError {
                message: format!("Unsupported endpoint scheme: {}", endpoint.scheme()),
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(AppError::OcrConfigError {
                message: "Timeout should be more than zero".to_string(),
            });
        }
        let mut options = HttpOcrClientOptions::new(endpoint);
        options.timeout = self.timeout_secs.map(Duration::from_secs);
        Ok(options)
    }
}
