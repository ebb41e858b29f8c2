//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Driving the exam session (start / answer / next / exit / clock tick)
//!     and appending finished attempts to the progress store
//!   - Studied toggles and portfolio document edits
//!   - Tutor chat turns and portfolio draft assist, each behind its in-flight slot
//!   - Evidence tagging of free text

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{ExamAttempt, ExamMode, OptionKey};
use crate::error::{AppError, AppResult, GatewayError};
use crate::exam::{ExamPhase, ExamReview, ExamSession, ExamSnapshot, Reveal};
use crate::state::AppState;
use crate::tagger;
use crate::tracker::{self, DocumentSummary};
use crate::tutor::{CompletionRequest, Turn};
use crate::util::fill_template;

// -------- Exam --------

async fn record_attempt(state: &AppState, attempt: ExamAttempt) -> AppResult<()> {
  state.progress.lock().await.record_attempt(attempt)?;
  Ok(())
}

#[instrument(level = "info", skip(state))]
pub async fn start_exam(state: &AppState, mode: ExamMode, topic: Option<&str>) -> AppResult<ExamSnapshot> {
  if mode == ExamMode::Topic && topic.map_or(true, |t| t.trim().is_empty()) {
    return Err(AppError::BadRequest("topic mode needs a requirement code".into()));
  }
  let mut exam = state.exam.lock().await;
  let session = {
    let mut rng = state.rng.lock().await;
    ExamSession::start(&state.catalog, mode, topic.map(str::trim), &mut *rng)
  };
  if session.total() == 0 {
    warn!(target: "exam", %mode, ?topic, "Selection is empty; nothing to ask");
  }
  *exam = session;
  Ok(exam.snapshot())
}

pub async fn exam_snapshot(state: &AppState) -> ExamSnapshot {
  state.exam.lock().await.snapshot()
}

#[instrument(level = "info", skip(state))]
pub async fn answer_exam(state: &AppState, option: OptionKey) -> AppResult<Reveal> {
  Ok(state.exam.lock().await.answer(option)?)
}

/// Advance past the revealed question; finishing appends the attempt.
#[instrument(level = "info", skip(state))]
pub async fn next_exam(state: &AppState) -> AppResult<ExamSnapshot> {
  let mut exam = state.exam.lock().await;
  if let Some(attempt) = exam.advance()? {
    record_attempt(state, attempt).await?;
  }
  Ok(exam.snapshot())
}

/// Back to mode selection; the session is discarded.
#[instrument(level = "info", skip(state))]
pub async fn exit_exam(state: &AppState) -> ExamSnapshot {
  let mut exam = state.exam.lock().await;
  if exam.phase() == ExamPhase::Active {
    info!(target: "exam", session = %exam.id(), "Exam abandoned; nothing recorded");
  }
  *exam = ExamSession::default();
  exam.snapshot()
}

pub async fn exam_review(state: &AppState) -> AppResult<ExamReview> {
  Ok(state.exam.lock().await.review()?)
}

/// One clock second. Returns the snapshot when this tick finished the exam.
pub async fn tick_exam(state: &AppState) -> Option<ExamSnapshot> {
  let mut exam = state.exam.lock().await;
  let attempt = exam.tick()?;
  if let Err(e) = record_attempt(state, attempt).await {
    error!(target: "exam", session = %exam.id(), error = %e, "Failed to persist timed-out attempt");
  }
  Some(exam.snapshot())
}

/// Drive the exam countdown for the life of the process.
pub async fn run_exam_clock(state: Arc<AppState>) {
  let mut clock = tokio::time::interval(Duration::from_secs(1));
  clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    clock.tick().await;
    if let Some(snap) = tick_exam(&state).await {
      debug!(target: "exam", session = %snap.session_id, "Clock finished the exam");
    }
  }
}

// -------- Studied set & portfolio --------

#[instrument(level = "info", skip(state))]
pub async fn toggle_studied(state: &AppState, code: &str) -> AppResult<bool> {
  if state.catalog.requirement(code).is_none() {
    return Err(AppError::NotFound(format!("requirement {code}")));
  }
  Ok(state.progress.lock().await.toggle_studied(code)?)
}

pub async fn list_documents(state: &AppState) -> Vec<DocumentSummary> {
  let progress = state.progress.lock().await;
  progress.documents().iter().map(|d| tracker::document_summary(&state.catalog, d)).collect()
}

pub async fn get_document(state: &AppState, id: i64) -> AppResult<DocumentSummary> {
  let progress = state.progress.lock().await;
  let doc = progress.document(id).ok_or_else(|| AppError::NotFound(format!("portfolio document {id}")))?;
  Ok(tracker::document_summary(&state.catalog, doc))
}

pub async fn create_document(state: &AppState) -> AppResult<DocumentSummary> {
  let doc = state.progress.lock().await.create_document()?;
  Ok(tracker::document_summary(&state.catalog, &doc))
}

pub async fn set_document_title(state: &AppState, id: i64, title: String) -> AppResult<DocumentSummary> {
  let doc = state.progress.lock().await.set_title(id, title)?;
  let doc = doc.ok_or_else(|| AppError::NotFound(format!("portfolio document {id}")))?;
  Ok(tracker::document_summary(&state.catalog, &doc))
}

#[instrument(level = "debug", skip(state, text), fields(text_len = text.len()))]
pub async fn set_section_text(state: &AppState, id: i64, section_id: &str, text: String) -> AppResult<DocumentSummary> {
  if state.catalog.section(section_id).is_none() {
    return Err(AppError::NotFound(format!("portfolio section {section_id}")));
  }
  let doc = state.progress.lock().await.set_section_text(id, section_id, text)?;
  let doc = doc.ok_or_else(|| AppError::NotFound(format!("portfolio document {id}")))?;
  Ok(tracker::document_summary(&state.catalog, &doc))
}

pub async fn delete_document(state: &AppState, id: i64) -> AppResult<bool> {
  Ok(state.progress.lock().await.delete_document(id)?)
}

pub fn tag_text(state: &AppState, text: &str) -> Vec<String> {
  tagger::tag(text, state.catalog.requirements())
}

pub async fn set_credential(state: &AppState, credential: &str) -> AppResult<bool> {
  let mut progress = state.progress.lock().await;
  progress.set_credential(credential)?;
  Ok(progress.credential().is_some())
}

/// Clear every persisted slot and drop the live exam session.
#[instrument(level = "info", skip(state))]
pub async fn reset_all(state: &AppState) -> AppResult<()> {
  let mut exam = state.exam.lock().await;
  *exam = ExamSession::default();
  state.progress.lock().await.reset()?;
  Ok(())
}

// -------- Tutor & draft assist --------

async fn require_credential(state: &AppState) -> Result<String, GatewayError> {
  state
    .progress
    .lock()
    .await
    .credential()
    .map(str::to_string)
    .ok_or(GatewayError::MissingCredential)
}

pub async fn transcript(state: &AppState) -> Vec<Turn> {
  state.transcript.lock().await.turns().to_vec()
}

pub async fn clear_transcript(state: &AppState) -> Vec<Turn> {
  let mut t = state.transcript.lock().await;
  t.clear(&state.prompts.cleared_greeting);
  t.turns().to_vec()
}

/// One chat turn: send history + message, append both on success.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn tutor_message(state: &AppState, text: &str) -> AppResult<Vec<Turn>> {
  let text = text.trim();
  if text.is_empty() {
    return Err(AppError::BadRequest("message is empty".into()));
  }
  let credential = require_credential(state).await?;
  let _in_flight = state.chat_slot.try_acquire()?;

  let (mut turns, generation) = {
    let t = state.transcript.lock().await;
    (t.turns().to_vec(), t.generation())
  };
  let learner = Turn::learner(text);
  turns.push(learner.clone());
  let request = CompletionRequest {
    system: Some(state.prompts.tutor_system.clone()),
    turns,
    max_output_tokens: state.tutor.max_output_tokens,
    temperature: 0.4,
  };

  let reply = state.provider.complete(&credential, request).await.map_err(|e| {
    error!(target: "tutor", error = %e, "Chat turn failed");
    e
  })?;

  let mut t = state.transcript.lock().await;
  if let Err(e) = t.append_exchange(generation, learner, Turn::assistant(reply)) {
    warn!(target: "tutor", generation, current = t.generation(), "Transcript cleared while waiting; reply discarded");
    return Err(e.into());
  }
  debug!(target: "tutor", turns = t.turns().len(), "Chat turn appended");
  Ok(t.turns().to_vec())
}

/// Generate a paragraph for one portfolio section and store it in place of the draft.
#[instrument(level = "info", skip(state))]
pub async fn draft_assist(state: &AppState, doc_id: i64, section_id: &str) -> AppResult<DocumentSummary> {
  let section = state
    .catalog
    .section(section_id)
    .ok_or_else(|| AppError::NotFound(format!("portfolio section {section_id}")))?;

  let (credential, draft, epoch) = {
    let progress = state.progress.lock().await;
    let doc = progress
      .document(doc_id)
      .ok_or_else(|| AppError::NotFound(format!("portfolio document {doc_id}")))?;
    let credential = progress.credential().map(str::to_string).ok_or(GatewayError::MissingCredential)?;
    (credential, doc.section_text(section_id).to_string(), progress.epoch())
  };
  let _in_flight = state.draft_slot.try_acquire()?;

  let prompt = fill_template(
    &state.prompts.draft_template,
    &[
      ("prompt", &section.prompt),
      ("draft", &draft),
      ("requirements", &section.requirements.join(", ")),
    ],
  );
  let request = CompletionRequest::prompt(prompt, state.tutor.max_output_tokens);
  let paragraph = state.provider.complete(&credential, request).await.map_err(|e| {
    error!(target: "tutor", error = %e, "Draft assist failed");
    e
  })?;

  let mut progress = state.progress.lock().await;
  if progress.epoch() != epoch {
    warn!(target: "portfolio", doc_id, "Progress was reset while drafting; paragraph discarded");
    return Err(GatewayError::Stale.into());
  }
  match progress.document(doc_id) {
    None => {
      warn!(target: "portfolio", doc_id, "Document deleted while drafting; paragraph discarded");
      return Err(GatewayError::Stale.into());
    }
    Some(doc) if doc.section_text(section_id) != draft => {
      warn!(target: "portfolio", doc_id, section = section_id, "Section edited while drafting; paragraph discarded");
      return Err(GatewayError::Stale.into());
    }
    Some(_) => {}
  }
  let doc = progress
    .set_section_text(doc_id, section_id, paragraph)?
    .ok_or(GatewayError::Stale)?;
  info!(target: "portfolio", doc_id, section = section_id, "Draft paragraph stored");
  Ok(tracker::document_summary(&state.catalog, &doc))
}
