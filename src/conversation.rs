use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::client::AskClient;
use crate::document::DocumentView;
use crate::markers::{extract_evidence, strip_markers};
use crate::models::{EvidenceSpan, FileUpload, Message, Role, StreamEvent};
use crate::sse::SseDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingResponse,
    StreamingReasoning,
    StreamingAnswer,
    Completing,
}

/// What a completed turn produced, for callers that render results.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub answer: String,
    pub navigated_to: Option<u32>,
    pub evidence_count: usize,
}

/// Controller verdict after each decoded event.
#[derive(Debug)]
pub enum TurnPhase {
    Streaming,
    Completed(TurnReport),
    Failed(String),
}

#[derive(Debug)]
pub enum TurnOutcome {
    Answered(TurnReport),
    Cancelled,
}

/// Owns all per-session state: the transcript, the backend session id, and
/// the active evidence set. One turn runs at a time; nothing is committed to
/// the transcript until the turn completes, so errors and cancellation leave
/// it untouched.
#[derive(Debug, Default)]
pub struct ConversationController {
    transcript: Vec<Message>,
    session_id: Option<String>,
    evidence: Vec<EvidenceSpan>,
    evidence_version: u64,
    state: TurnState,
    pending_question: Option<String>,
    reasoning_buf: String,
    answer_buf: String,
    last_status: Option<String>,
}

impl ConversationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_turn(&mut self, question: &str) -> Result<()> {
        if self.state != TurnState::Idle {
            anyhow::bail!("a question is already in flight");
        }

        self.pending_question = Some(question.to_string());
        self.reasoning_buf.clear();
        self.answer_buf.clear();
        self.last_status = None;
        self.state = TurnState::AwaitingResponse;
        Ok(())
    }

    pub fn apply_event(&mut self, event: StreamEvent, view: &mut DocumentView) -> TurnPhase {
        match event {
            StreamEvent::Reasoning(delta) => {
                self.reasoning_buf.push_str(&delta);
                self.state = TurnState::StreamingReasoning;
                TurnPhase::Streaming
            }
            StreamEvent::Answer(delta) => {
                self.answer_buf.push_str(&delta);
                self.state = TurnState::StreamingAnswer;
                TurnPhase::Streaming
            }
            StreamEvent::Status(message) => {
                self.last_status = Some(message);
                TurnPhase::Streaming
            }
            StreamEvent::ToolCall { name, input } => {
                tracing::debug!("model invoked tool {name}: {input}");
                TurnPhase::Streaming
            }
            StreamEvent::Complete {
                content,
                session_id,
            } => self.complete_turn(content, session_id, view),
            StreamEvent::Error(message) => {
                self.abort_turn();
                TurnPhase::Failed(message)
            }
        }
    }

    fn complete_turn(
        &mut self,
        content: Option<String>,
        session_id: Option<String>,
        view: &mut DocumentView,
    ) -> TurnPhase {
        self.state = TurnState::Completing;

        // Some completion events omit the full text; fall back to the
        // accumulated deltas.
        let final_text = match content {
            Some(text) if !text.is_empty() => text,
            _ => std::mem::take(&mut self.answer_buf),
        };

        let mut spans = extract_evidence(&final_text);
        demote_out_of_range_pages(&mut spans, view.page_count());
        let display = strip_markers(&final_text);

        if let Some(question) = self.pending_question.take() {
            self.transcript.push(Message::now(Role::User, question));
        }
        if !self.reasoning_buf.trim().is_empty() {
            let reasoning = std::mem::take(&mut self.reasoning_buf);
            self.transcript.push(Message::now(Role::Reasoning, reasoning));
        }
        self.transcript
            .push(Message::now(Role::Assistant, display.clone()));

        // Replaced wholesale, never merged: the active evidence set always
        // describes the most recent answer only.
        self.evidence = spans;
        self.evidence_version += 1;
        let navigated_to = view.jump_to_evidence(&self.evidence);

        if let Some(session) = session_id {
            self.session_id = Some(session);
        }

        tracing::info!(
            "turn complete: evidence={} navigated_to={:?}",
            self.evidence.len(),
            navigated_to
        );

        let report = TurnReport {
            answer: display,
            navigated_to,
            evidence_count: self.evidence.len(),
        };

        self.reasoning_buf.clear();
        self.answer_buf.clear();
        self.last_status = None;
        self.state = TurnState::Idle;
        TurnPhase::Completed(report)
    }

    /// Cooperative stop: discards the in-flight turn without committing
    /// anything to the transcript.
    pub fn cancel(&mut self) {
        self.abort_turn();
    }

    fn abort_turn(&mut self) {
        self.pending_question = None;
        self.reasoning_buf.clear();
        self.answer_buf.clear();
        self.last_status = None;
        self.state = TurnState::Idle;
    }

    /// Loading a new document invalidates the session, the transcript, and
    /// the evidence set.
    pub fn reset_document(&mut self) {
        self.abort_turn();
        self.session_id = None;
        self.transcript.clear();
        self.evidence.clear();
        self.evidence_version += 1;
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn evidence(&self) -> &[EvidenceSpan] {
        &self.evidence
    }

    pub fn evidence_version(&self) -> u64 {
        self.evidence_version
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Resumes a previously issued backend session, e.g. across CLI
    /// invocations.
    pub fn adopt_session(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Live accumulator views for in-progress display.
    pub fn reasoning_in_progress(&self) -> &str {
        &self.reasoning_buf
    }

    pub fn answer_in_progress(&self) -> &str {
        &self.answer_buf
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }
}

/// Page numbers outside `[1, page_count]` carry no usable constraint; demote
/// them instead of erroring so the span still correlates on any page.
fn demote_out_of_range_pages(spans: &mut [EvidenceSpan], page_count: u32) {
    for span in spans {
        if let Some(page) = span.page_number {
            if page < 1 || page > page_count {
                span.page_number = None;
            }
        }
    }
}

/// Drives one full question/answer turn: posts the question, decodes the
/// event stream chunk by chunk, and feeds the controller. `on_event` fires for
/// every decoded event before it is applied, for live display. Cancelling the
/// token aborts the in-flight read and rolls the controller back to idle.
pub async fn run_turn(
    client: &AskClient,
    controller: &mut ConversationController,
    view: &mut DocumentView,
    question: &str,
    file: Option<FileUpload>,
    cancel: &CancellationToken,
    mut on_event: impl FnMut(&StreamEvent),
) -> Result<TurnOutcome> {
    controller.begin_turn(question)?;
    let session_id = controller.session_id().map(|s| s.to_string());

    let mut response = match client.ask(question, file, session_id.as_deref()).await {
        Ok(response) => response,
        Err(err) => {
            controller.cancel();
            return Err(err);
        }
    };

    let mut decoder = SseDecoder::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                controller.cancel();
                return Ok(TurnOutcome::Cancelled);
            }
            chunk = response.chunk() => chunk,
        };

        let bytes = match chunk {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(err) => {
                controller.cancel();
                return Err(err).context("event stream read failed");
            }
        };

        for event in decoder.push(&bytes) {
            on_event(&event);
            match controller.apply_event(event, view) {
                TurnPhase::Streaming => {}
                TurnPhase::Completed(report) => return Ok(TurnOutcome::Answered(report)),
                TurnPhase::Failed(message) => {
                    anyhow::bail!("backend reported error: {message}");
                }
            }
        }
    }

    controller.cancel();
    anyhow::bail!("event stream closed before a completion event");
}
