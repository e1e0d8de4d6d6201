use crate::common_types::{DisplayName, SelectionGeneration};
use crate::errors::AppError;
use crate::file_selection::{FileSelection, SelectedFile};
use crate::ocr_client::OcrResponse;
use crate::preview::PreviewState;
use crate::AppResult;
use rvstruct::ValueStruct;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum UiStatus {
    Idle,
    Previewing,
    Submitting,
    Done(OcrResponse),
}

#[derive(Debug, Clone)]
pub struct PreviewTicket {
    pub generation: SelectionGeneration,
    pub file: SelectedFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionId {
    pub generation: SelectionGeneration,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
struct InFlightSubmission {
    id: SubmissionId,
    display_name: DisplayName,
}

#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    pub id: SubmissionId,
    pub file: SelectedFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    Discarded,
}

/// Read-only view of the workflow state handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub generation: SelectionGeneration,
    pub selected: Option<DisplayName>,
    pub preview: PreviewState,
    pub status: UiStatus,
    pub can_submit: bool,
}

/// The workflow state machine.
///
/// Owns the selection, its preview and the outcome of the last submission.
/// Asynchronous work is described by tickets; their completions are only
/// applied while the ticket still belongs to the current selection.
///
/// At most one OCR request is in flight at a time. A request whose selection
/// was replaced is detached: it keeps blocking new submissions until it
/// completes, and its response is discarded.
#[derive(Debug)]
pub struct WorkflowController {
    selection: FileSelection,
    preview: PreviewState,
    preview_pending: bool,
    submission_in_flight: Option<SubmissionId>,
    detached_submission: Option<InFlightSubmission>,
    submission_sequence: u64,
    last_response: Option<OcrResponse>,
    status: UiStatus,
}

impl WorkflowController {
    pub fn new() -> Self {
        WorkflowController {
            selection: FileSelection::new(),
            preview: PreviewState::Empty,
            preview_pending: false,
            submission_in_flight: None,
            detached_submission: None,
            submission_sequence: 0,
            last_response: None,
            status: UiStatus::Idle,
        }
    }

    pub fn status(&self) -> &UiStatus {
        &self.status
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selection.current()
    }

    pub fn generation(&self) -> SelectionGeneration {
        self.selection.generation()
    }

    pub fn can_submit(&self) -> bool {
        self.selection.current().is_some()
            && self.submission_in_flight.is_none()
            && self.detached_submission.is_none()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            generation: self.generation(),
            selected: self.selected_file().map(|file| file.display_name.clone()),
            preview: self.preview().clone(),
            status: self.status().clone(),
            can_submit: self.can_submit(),
        }
    }

    /// Replaces the selection. Returns the preview work to start, if any.
    ///
    /// The pending preview, the last response and any in-flight submission
    /// of the previous selection are detached: their results will be discarded.
    pub fn select(&mut self, file: Option<SelectedFile>) -> Option<PreviewTicket> {
        if let Some(id) = self.submission_in_flight.take() {
            if let Some(previous) = self.selection.current() {
                self.detached_submission = Some(InFlightSubmission {
                    id,
                    display_name: previous.display_name.clone(),
                });
            }
        }
        let ticket = self.selection.select(file).cloned().map(|file| PreviewTicket {
            generation: self.selection.generation(),
            file,
        });
        self.preview = PreviewState::Empty;
        self.preview_pending = ticket.is_some();
        self.last_response = None;
        self.refresh_status();
        ticket
    }

    pub fn complete_preview(
        &mut self,
        generation: SelectionGeneration,
        preview: PreviewState,
    ) -> CompletionOutcome {
        if !self.selection.is_current(generation) || !self.preview_pending {
            debug!(
                generation = generation.value(),
                current = self.selection.generation().value(),
                "Discarding stale preview"
            );
            return CompletionOutcome::Discarded;
        }
        self.preview = preview;
        self.preview_pending = false;
        self.refresh_status();
        CompletionOutcome::Applied
    }

    pub fn begin_submission(&mut self) -> AppResult<SubmissionTicket> {
        let file = self
            .selection
            .current()
            .cloned()
            .ok_or(AppError::NoFileSelected)?;
        if let Some(detached) = &self.detached_submission {
            return Err(AppError::SubmissionInFlight {
                display_name: detached.display_name.value().clone(),
            });
        }
        if self.submission_in_flight.is_some() {
            return Err(AppError::SubmissionInFlight {
                display_name: file.display_name.value().clone(),
            });
        }

        self.submission_sequence += 1;
        let id = SubmissionId {
            generation: self.selection.generation(),
            sequence: self.submission_sequence,
        };
        self.submission_in_flight = Some(id);
        self.last_response = None;
        self.refresh_status();
        Ok(SubmissionTicket { id, file })
    }

    pub fn complete_submission(
        &mut self,
        id: SubmissionId,
        response: OcrResponse,
    ) -> CompletionOutcome {
        if self
            .detached_submission
            .as_ref()
            .is_some_and(|detached| detached.id == id)
        {
            debug!(
                generation = id.generation.value(),
                sequence = id.sequence,
                "Detached OCR request completed, discarding its response"
            );
            self.detached_submission = None;
            return CompletionOutcome::Discarded;
        }
        if self.submission_in_flight != Some(id) || !self.selection.is_current(id.generation) {
            debug!(
                generation = id.generation.value(),
                sequence = id.sequence,
                "Discarding stale OCR response"
            );
            return CompletionOutcome::Discarded;
        }
        self.submission_in_flight = None;
        self.last_response = Some(response);
        self.refresh_status();
        CompletionOutcome::Applied
    }

    fn refresh_status(&mut self) {
        let status = if self.submission_in_flight.is_some() {
            UiStatus::Submitting
        } else if let Some(response) = &self.last_response {
            UiStatus::Done(response.clone())
        } else if self.preview_pending {
            UiStatus::Previewing
        } else {
            UiStatus::Idle
        };
        if status != self.status {
            debug!(from = ?self.status, to = ?status, "Workflow status changed");
            self.status = status;
        }
    }
}

impl Default for WorkflowController {
    fn default() -> Self {
        Self::new()
    }
}
