use crate::errors::AppError;
use crate::file_selection::SelectedFile;
use crate::ocr_client::{OcrClient, OcrResponse};
use crate::preview::{DataUrlPreviewRenderer, PreviewRenderer, PreviewState};
use crate::AppResult;
use axum::extract::Multipart;
use axum::{Json, Router};
use rvstruct::ValueStruct;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub async fn spawn_stub_ocr_server(router: Router) -> AppResult<Url> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(Url::parse(&format!("http://{addr}/ocr"))?)
}

/// An address nobody listens on anymore.
pub async fn unreachable_endpoint() -> AppResult<Url> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(Url::parse(&format!("http://{addr}/ocr"))?)
}

/// Replies with `<part name>:<file name>:<content type>:<size>` for the first
/// part it finds.
pub async fn echo_file_part(mut multipart: Multipart) -> Json<serde_json::Value> {
    let mut parts = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
        parts.push(format!("{name}:{file_name}:{content_type}:{size}"));
    }
    match parts.as_slice() {
        [single] => Json(json!({ "text": single })),
        [] => Json(json!({ "error": "Nessun file inviato" })),
        _ => Json(json!({ "error": format!("Too many parts: {}", parts.len()) })),
    }
}

#[derive(Clone, Default)]
pub struct DelayedPreviewRenderer {
    inner: DataUrlPreviewRenderer,
    delays: Arc<HashMap<String, Duration>>,
    finished: Arc<AtomicUsize>,
}

impl DelayedPreviewRenderer {
    pub fn with_delay(mut self, display_name: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(display_name.to_string(), delay);
        self
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl PreviewRenderer for DelayedPreviewRenderer {
    async fn render(&self, file: &SelectedFile) -> PreviewState {
        if let Some(delay) = self.delays.get(file.display_name.value()) {
            tokio::time::sleep(*delay).await;
        }
        let preview = self.inner.render(file).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        preview
    }
}

#[derive(Clone, Default)]
pub struct ScriptedOcrClient {
    script: Arc<HashMap<String, (Duration, OcrResponse)>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedOcrClient {
    pub fn with_response(mut self, display_name: &str, delay: Duration, text: &str) -> Self {
        Arc::make_mut(&mut self.script).insert(
            display_name.to_string(),
            (
                delay,
                OcrResponse::Recognized {
                    text: text.to_string(),
                },
            ),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrClient for ScriptedOcrClient {
    async fn submit(&self, file: &SelectedFile) -> OcrResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(file.display_name.value()) {
            Some((delay, response)) => {
                tokio::time::sleep(*delay).await;
                response.clone()
            }
            None => OcrResponse::TransportError {
                message: format!("No scripted response for {}", file.display_name.value()),
            },
        }
    }
}

pub fn memory_image(display_name: &str, content: &'static [u8]) -> SelectedFile {
    SelectedFile::from_bytes(display_name, mime::IMAGE_PNG, bytes::Bytes::from_static(content))
}

pub fn expect_stopped<T: std::fmt::Debug>(result: AppResult<T>) {
    assert!(
        matches!(result, Err(AppError::WorkflowStopped)),
        "Expected stopped workflow, got {result:?}"
    );
}
