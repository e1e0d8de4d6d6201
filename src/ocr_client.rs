use crate::file_selection::SelectedFile;
use crate::AppResult;
use rvstruct::ValueStruct;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one completed OCR request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OcrResponse {
    Recognized { text: String },
    ServiceError { message: String },
    TransportError { message: String },
}

impl OcrResponse {
    pub fn is_recognized(&self) -> bool {
        matches!(self, OcrResponse::Recognized { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HttpOcrClientOptions {
    pub endpoint: Url,
    pub timeout: Option<Duration>,
}

impl HttpOcrClientOptions {
    pub const DEFAULT_ENDPOINT: &'static str = "http://127.0.0.1:5000/ocr";

    pub fn new(endpoint: Url) -> Self {
        HttpOcrClientOptions {
            endpoint,
            timeout: None,
        }
    }
}

pub trait OcrClient {
    /// Sends exactly one request. Every failure is folded into the returned
    /// [`OcrResponse`], nothing is retried.
    async fn submit(&self, file: &SelectedFile) -> OcrResponse;
}

#[derive(Clone)]
pub struct HttpOcrClient {
    client: reqwest::Client,
    options: HttpOcrClientOptions,
}

#[derive(Deserialize, Clone, Debug)]
struct OcrResponseBody {
    text: Option<String>,
    error: Option<String>,
}

impl HttpOcrClient {
    pub const FILE_PART_NAME: &'static str = "file";

    pub fn new(options: HttpOcrClientOptions) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            options,
        })
    }

    async fn send_file(&self, file: &SelectedFile) -> Result<reqwest::Response, OcrResponse> {
        let content = file
            .read_content()
            .await
            .map_err(|err| OcrResponse::TransportError {
                message: err.to_string(),
            })?;
        let file_part = reqwest::multipart::Part::bytes(content.to_vec())
            .file_name(file.display_name.value().clone())
            .mime_str(file.media_type.as_ref())
            .map_err(|err| OcrResponse::TransportError {
                message: describe_error(&err),
            })?;
        let form = reqwest::multipart::Form::new().part(Self::FILE_PART_NAME, file_part);

        info!(
            file = file.display_name.value().as_str(),
            endpoint = %self.options.endpoint,
            size = content.len(),
            "Submitting file for recognition"
        );
        self.client
            .post(self.options.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| OcrResponse::TransportError {
                message: describe_error(&err),
            })
    }

    async fn interpret_response(response: reqwest::Response) -> OcrResponse {
        let response_status = response.status();
        if !response_status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            let reported_error = serde_json::from_str::<OcrResponseBody>(&response_text)
                .ok()
                .and_then(|body| body.error);
            let message = match reported_error {
                Some(error) => format!("{response_status}: {error}"),
                None => response_status.to_string(),
            };
            warn!(%response_status, "OCR service rejected the request");
            return OcrResponse::ServiceError { message };
        }

        match response.bytes().await {
            Ok(body) => Self::interpret_body(&body),
            Err(err) => OcrResponse::TransportError {
                message: describe_error(&err),
            },
        }
    }

    fn interpret_body(body: &[u8]) -> OcrResponse {
        match serde_json::from_slice::<OcrResponseBody>(body) {
            Ok(OcrResponseBody {
                error: Some(message),
                ..
            }) => OcrResponse::ServiceError { message },
            Ok(OcrResponseBody { text, error: None }) => OcrResponse::Recognized {
                text: text.unwrap_or_default(),
            },
            Err(err) => OcrResponse::TransportError {
                message: format!("Malformed OCR response: {err}"),
            },
        }
    }
}

impl OcrClient for HttpOcrClient {
    async fn submit(&self, file: &SelectedFile) -> OcrResponse {
        let result = match self.send_file(file).await {
            Ok(response) => Self::interpret_response(response).await,
            Err(failed) => failed,
        };
        debug!(?result, "OCR request completed");
        result
    }
}

fn describe_error(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[allow(unused_imports)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use bytes::Bytes;
    use serde_json::json;

    fn test_file() -> SelectedFile {
        SelectedFile::from_bytes(
            "invoice.png",
            mime::IMAGE_PNG,
            Bytes::from_static(b"\x89PNG fake"),
        )
    }

    async fn submit_to(router: Router) -> AppResult<OcrResponse> {
        let endpoint = spawn_stub_ocr_server(router).await?;
        let client = HttpOcrClient::new(HttpOcrClientOptions::new(endpoint))?;
        Ok(client.submit(&test_file()).await)
    }

    #[tokio::test]
    async fn recognized_text_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async { Json(json!({ "text": "hello" })) }),
        );
        assert_eq!(
            submit_to(router).await?,
            OcrResponse::Recognized {
                text: "hello".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn sends_single_file_part_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let router = Router::new().route("/ocr", post(echo_file_part));
        assert_eq!(
            submit_to(router).await?,
            OcrResponse::Recognized {
                text: "file:invoice.png:image/png:9".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn http_failure_is_service_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "text": "should be ignored" })),
                )
            }),
        );
        match submit_to(router).await? {
            OcrResponse::ServiceError { message } => {
                assert_eq!(message, "500 Internal Server Error")
            }
            other => panic!("Unexpected response: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn http_failure_carries_reported_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Nessun file inviato" })),
                )
            }),
        );
        assert_eq!(
            submit_to(router).await?,
            OcrResponse::ServiceError {
                message: "400 Bad Request: Nessun file inviato".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn reported_error_is_service_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async { Json(json!({ "error": "bad image" })) }),
        );
        assert_eq!(
            submit_to(router).await?,
            OcrResponse::ServiceError {
                message: "bad image".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn error_wins_over_text_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async { Json(json!({ "text": "partial", "error": "bad image" })) }),
        );
        assert_eq!(
            submit_to(router).await?,
            OcrResponse::ServiceError {
                message: "bad image".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_object_is_empty_text_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route("/ocr", post(|| async { Json(json!({})) }));
        assert_eq!(
            submit_to(router).await?,
            OcrResponse::Recognized {
                text: String::new()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_transport_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route("/ocr", post(|| async { "definitely not json" }));
        assert!(matches!(
            submit_to(router).await?,
            OcrResponse::TransportError { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let endpoint = unreachable_endpoint().await?;
        let client = HttpOcrClient::new(HttpOcrClientOptions::new(endpoint))?;
        match client.submit(&test_file()).await {
            OcrResponse::TransportError { message } => assert!(!message.is_empty()),
            other => panic!("Unexpected response: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn timeout_is_transport_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "text": "too late" }))
            }),
        );
        let endpoint = spawn_stub_ocr_server(router).await?;
        let client = HttpOcrClient::new(HttpOcrClientOptions {
            endpoint,
            timeout: Some(Duration::from_millis(100)),
        })?;
        assert!(matches!(
            client.submit(&test_file()).await,
            OcrResponse::TransportError { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_file_is_transport_error_test(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new().route(
            "/ocr",
            post(|| async { Json(json!({ "text": "never reached" })) }),
        );
        let endpoint = spawn_stub_ocr_server(router).await?;
        let client = HttpOcrClient::new(HttpOcrClientOptions::new(endpoint))?;
        let file = SelectedFile::from_path("/definitely/not/here/scan.png");
        assert!(matches!(
            client.submit(&file).await,
            OcrResponse::TransportError { .. }
        ));
        Ok(())
    }

    #[test]
    fn response_json_shape_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let value = serde_json::to_value(OcrResponse::Recognized {
            text: "hello".to_string(),
        })?;
        assert_eq!(value, json!({ "status": "recognized", "text": "hello" }));
        Ok(())
    }

    #[tokio::test]
    #[cfg_attr(not(feature = "ci-ocr-endpoint"), ignore)]
    async fn live_endpoint_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_endpoint: Url = Url::parse(
            std::env::var("TEST_OCR_ENDPOINT")
                .expect("TEST_OCR_ENDPOINT required")
                .as_str(),
        )?;
        // 1x1 transparent PNG
        const TINY_PNG: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78,
            0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
            0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ];
        let temp_dir = tempfile::TempDir::with_prefix("ocr_client_live_tests")?;
        let temp_file = temp_dir.path().join("blank.png");
        tokio::fs::write(&temp_file, TINY_PNG).await?;

        let client = HttpOcrClient::new(HttpOcrClientOptions::new(test_endpoint))?;
        let response = client.submit(&SelectedFile::from_path(&temp_file)).await;
        assert!(
            response.is_recognized(),
            "Unexpected response: {response:?}"
        );
        Ok(())
    }
}
