use crate::common_types::SelectionGeneration;
use crate::errors::AppError;
use crate::file_selection::SelectedFile;
use crate::ocr_client::{OcrClient, OcrResponse};
use crate::preview::{PreviewRenderer, PreviewState};
use crate::workflow::controller::{
    PreviewTicket, SubmissionId, SubmissionTicket, UiStatus, WorkflowController, WorkflowSnapshot,
};
use crate::AppResult;
use futures::future::{AbortHandle, Abortable, LocalBoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use rvstruct::ValueStruct;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

pub enum WorkflowEvent {
    Select {
        file: Option<SelectedFile>,
        reply: oneshot::Sender<SelectionGeneration>,
    },
    Submit {
        reply: oneshot::Sender<AppResult<()>>,
    },
    Shutdown,
}

enum Completion {
    Preview {
        generation: SelectionGeneration,
        preview: PreviewState,
    },
    PreviewAborted {
        generation: SelectionGeneration,
    },
    Submission {
        id: SubmissionId,
        response: OcrResponse,
    },
}

type InFlight = FuturesUnordered<LocalBoxFuture<'static, Completion>>;

/// Drives a [`WorkflowController`] on the current task.
///
/// User events and completions of preview/submission work are interleaved on
/// a single task, so the controller is never touched concurrently. Completions
/// are applied in the order they finish.
pub struct WorkflowRunner<R, C> {
    controller: WorkflowController,
    renderer: R,
    client: C,
    events: mpsc::UnboundedReceiver<WorkflowEvent>,
    snapshots: watch::Sender<WorkflowSnapshot>,
    preview_abort: Option<AbortHandle>,
}

#[derive(Clone)]
pub struct WorkflowHandle {
    events: mpsc::UnboundedSender<WorkflowEvent>,
    snapshots: watch::Receiver<WorkflowSnapshot>,
}

pub fn workflow<R, C>(renderer: R, client: C) -> (WorkflowRunner<R, C>, WorkflowHandle)
where
    R: PreviewRenderer + Clone + 'static,
    C: OcrClient + Clone + 'static,
{
    let controller = WorkflowController::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (snapshots_tx, snapshots_rx) = watch::channel(controller.snapshot());
    (
        WorkflowRunner {
            controller,
            renderer,
            client,
            events: events_rx,
            snapshots: snapshots_tx,
            preview_abort: None,
        },
        WorkflowHandle {
            events: events_tx,
            snapshots: snapshots_rx,
        },
    )
}

impl<R, C> WorkflowRunner<R, C>
where
    R: PreviewRenderer + Clone + 'static,
    C: OcrClient + Clone + 'static,
{
    /// Runs until [`WorkflowHandle::shutdown`] is called or every handle is dropped.
    /// Work still in flight at that point is dropped.
    pub async fn run(mut self) -> AppResult<()> {
        let mut in_flight: InFlight = FuturesUnordered::new();
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(WorkflowEvent::Select { file, reply }) => {
                        self.handle_select(file, &mut in_flight);
                        let _ = reply.send(self.controller.generation());
                    }
                    Some(WorkflowEvent::Submit { reply }) => {
                        let result = self.handle_submit(&mut in_flight);
                        let _ = reply.send(result);
                    }
                    Some(WorkflowEvent::Shutdown) | None => break,
                },
                Some(completion) = in_flight.next(), if !in_flight.is_empty() => {
                    self.handle_completion(completion);
                }
            }
        }
        if let Some(abort_handle) = self.preview_abort.take() {
            abort_handle.abort();
        }
        debug!(dropped = in_flight.len(), "Workflow stopped");
        Ok(())
    }

    fn handle_select(&mut self, file: Option<SelectedFile>, in_flight: &mut InFlight) {
        if let Some(abort_handle) = self.preview_abort.take() {
            abort_handle.abort();
        }
        if let Some(ticket) = self.controller.select(file) {
            in_flight.push(self.start_preview(ticket));
        }
        self.publish();
    }

    fn handle_submit(&mut self, in_flight: &mut InFlight) -> AppResult<()> {
        let ticket = self.controller.begin_submission()?;
        info!(
            file = ticket.file.display_name.value().as_str(),
            sequence = ticket.id.sequence,
            "Submission started"
        );
        in_flight.push(self.start_submission(ticket));
        self.publish();
        Ok(())
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Preview {
                generation,
                preview,
            } => {
                self.controller.complete_preview(generation, preview);
            }
            Completion::PreviewAborted { generation } => {
                debug!(generation = generation.value(), "Preview render aborted");
            }
            Completion::Submission { id, response } => {
                self.controller.complete_submission(id, response);
            }
        }
        self.publish();
    }

    fn start_preview(&mut self, ticket: PreviewTicket) -> LocalBoxFuture<'static, Completion> {
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        self.preview_abort = Some(abort_handle);
        let renderer = self.renderer.clone();
        async move {
            let generation = ticket.generation;
            let render = async { renderer.render(&ticket.file).await };
            match Abortable::new(render, abort_registration).await {
                Ok(preview) => Completion::Preview {
                    generation,
                    preview,
                },
                Err(_) => Completion::PreviewAborted { generation },
            }
        }
        .boxed_local()
    }

    fn start_submission(&self, ticket: SubmissionTicket) -> LocalBoxFuture<'static, Completion> {
        let client = self.client.clone();
        async move {
            let response = client.submit(&ticket.file).await;
            Completion::Submission {
                id: ticket.id,
                response,
            }
        }
        .boxed_local()
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }
}

impl WorkflowHandle {
    pub async fn select(&self, file: Option<SelectedFile>) -> AppResult<SelectionGeneration> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(WorkflowEvent::Select { file, reply })
            .map_err(|_| AppError::WorkflowStopped)?;
        response.await.map_err(|_| AppError::WorkflowStopped)
    }

    /// Fails with [`AppError::NoFileSelected`] or [`AppError::SubmissionInFlight`]
    /// before anything is sent to the OCR service.
    pub async fn submit(&self) -> AppResult<()> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(WorkflowEvent::Submit { reply })
            .map_err(|_| AppError::WorkflowStopped)?;
        response.await.map_err(|_| AppError::WorkflowStopped)?
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(WorkflowEvent::Shutdown);
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.snapshots.clone()
    }

    pub async fn wait_for<F>(&self, predicate: F) -> AppResult<WorkflowSnapshot>
    where
        F: FnMut(&WorkflowSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| AppError::WorkflowStopped)?;
        Ok(snapshot.clone())
    }

    /// Waits until the preview of `generation` is settled.
    pub async fn wait_previewed(
        &self,
        generation: SelectionGeneration,
    ) -> AppResult<WorkflowSnapshot> {
        self.wait_for(|snapshot| {
            snapshot.generation != generation || snapshot.status != UiStatus::Previewing
        })
        .await
    }

    /// Waits for the outcome of the submission of `generation`.
    pub async fn wait_done(&self, generation: SelectionGeneration) -> AppResult<WorkflowSnapshot> {
        self.wait_for(|snapshot| {
            snapshot.generation != generation || matches!(snapshot.status, UiStatus::Done(_))
        })
        .await
    }
}
