//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, Query, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::catalog::GradeBoundaries;
use crate::domain::{ExamAttempt, PortfolioSectionTemplate, Question};
use crate::error::{AppError, AppResult};
use crate::exam::{ExamReview, ExamSnapshot, Reveal};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::tracker::{self, Dashboard, DocumentSummary, RequirementProgress, TrackerView};

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// -------- Catalog --------

#[instrument(level = "info", skip(state))]
pub async fn http_list_requirements(
  State(state): State<Arc<AppState>>,
  Query(q): Query<CategoryQuery>,
) -> Json<Vec<RequirementProgress>> {
  let progress = state.progress.lock().await;
  Json(tracker::tracker(&state.catalog, &progress, q.category).requirements)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_requirement(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> AppResult<Json<RequirementProgress>> {
  let progress = state.progress.lock().await;
  tracker::requirement_progress(&state.catalog, &progress, &id)
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("requirement {id}")))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_questions(
  State(state): State<Arc<AppState>>,
  Query(q): Query<QuestionQuery>,
) -> Json<Vec<Question>> {
  let questions: Vec<Question> = match q.requirement.as_deref() {
    Some(code) => state.catalog.questions_for(code).cloned().collect(),
    None => state.catalog.questions().to_vec(),
  };
  Json(questions)
}

/// Codes a topic-mode exam can be started for.
pub async fn http_list_topics(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
  Json(state.catalog.topic_codes().into_iter().map(str::to_string).collect())
}

pub async fn http_list_sections(State(state): State<Arc<AppState>>) -> Json<Vec<PortfolioSectionTemplate>> {
  Json(state.catalog.sections().to_vec())
}

pub async fn http_grade_boundaries(State(state): State<Arc<AppState>>) -> Json<GradeBoundaries> {
  Json(state.catalog.grade_boundaries())
}

// -------- Progress --------

#[instrument(level = "info", skip(state))]
pub async fn http_toggle_studied(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> AppResult<Json<StudiedOut>> {
  let studied = toggle_studied(&state, &id).await?;
  info!(target: "moet_study", %id, studied, "HTTP studied toggled");
  Ok(Json(StudiedOut { id, studied }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_dashboard(State(state): State<Arc<AppState>>) -> Json<Dashboard> {
  let progress = state.progress.lock().await;
  Json(tracker::dashboard(&state.catalog, &progress))
}

#[instrument(level = "info", skip(state))]
pub async fn http_tracker(
  State(state): State<Arc<AppState>>,
  Query(q): Query<CategoryQuery>,
) -> Json<TrackerView> {
  let progress = state.progress.lock().await;
  Json(tracker::tracker(&state.catalog, &progress, q.category))
}

pub async fn http_attempts(State(state): State<Arc<AppState>>) -> Json<Vec<ExamAttempt>> {
  Json(state.progress.lock().await.attempts().to_vec())
}

// -------- Exam --------

pub async fn http_exam_status(State(state): State<Arc<AppState>>) -> Json<ExamSnapshot> {
  Json(exam_snapshot(&state).await)
}

#[instrument(level = "info", skip(state, body), fields(mode = %body.mode, topic = ?body.topic))]
pub async fn http_exam_start(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartExamIn>,
) -> AppResult<Json<ExamSnapshot>> {
  let snapshot = start_exam(&state, body.mode, body.topic.as_deref()).await?;
  info!(target: "exam", session = %snapshot.session_id, total = snapshot.total, "HTTP exam started");
  Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state, body), fields(option = %body.option))]
pub async fn http_exam_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> AppResult<Json<Reveal>> {
  let reveal = answer_exam(&state, body.option).await?;
  info!(target: "exam", question = reveal.question_id, correct = reveal.correct, "HTTP answer revealed");
  Ok(Json(reveal))
}

pub async fn http_exam_next(State(state): State<Arc<AppState>>) -> AppResult<Json<ExamSnapshot>> {
  Ok(Json(next_exam(&state).await?))
}

pub async fn http_exam_exit(State(state): State<Arc<AppState>>) -> Json<ExamSnapshot> {
  Json(exit_exam(&state).await)
}

pub async fn http_exam_review(State(state): State<Arc<AppState>>) -> AppResult<Json<ExamReview>> {
  Ok(Json(exam_review(&state).await?))
}

// -------- Portfolio --------

pub async fn http_list_documents(State(state): State<Arc<AppState>>) -> Json<Vec<DocumentSummary>> {
  Json(list_documents(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_document(State(state): State<Arc<AppState>>) -> AppResult<Json<DocumentSummary>> {
  Ok(Json(create_document(&state).await?))
}

pub async fn http_get_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> AppResult<Json<DocumentSummary>> {
  Ok(Json(get_document(&state, id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> AppResult<Json<DeletedOut>> {
  let deleted = delete_document(&state, id).await?;
  Ok(Json(DeletedOut { deleted }))
}

#[instrument(level = "info", skip(state, body), fields(title_len = body.title.len()))]
pub async fn http_set_title(
  State(state): State<Arc<AppState>>,
  Path(id): Path<i64>,
  Json(body): Json<TitleIn>,
) -> AppResult<Json<DocumentSummary>> {
  Ok(Json(set_document_title(&state, id, body.title).await?))
}

pub async fn http_set_section(
  State(state): State<Arc<AppState>>,
  Path((id, section)): Path<(i64, String)>,
  Json(body): Json<SectionIn>,
) -> AppResult<Json<DocumentSummary>> {
  Ok(Json(set_section_text(&state, id, &section, body.text).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_draft_assist(
  State(state): State<Arc<AppState>>,
  Path((id, section)): Path<(i64, String)>,
) -> AppResult<Json<DocumentSummary>> {
  Ok(Json(draft_assist(&state, id, &section).await?))
}

#[instrument(level = "debug", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_tag(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TagIn>,
) -> Json<TagOut> {
  Json(TagOut { requirements: tag_text(&state, &body.text) })
}

// -------- Tutor --------

pub async fn http_transcript(State(state): State<Arc<AppState>>) -> Json<TranscriptOut> {
  let turns = transcript(&state).await;
  Json(TranscriptOut { turns, busy: state.chat_slot.is_busy() })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_tutor_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TutorIn>,
) -> AppResult<Json<TranscriptOut>> {
  let turns = tutor_message(&state, &body.text).await?;
  Ok(Json(TranscriptOut { turns, busy: state.chat_slot.is_busy() }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_tutor_clear(State(state): State<Arc<AppState>>) -> Json<TranscriptOut> {
  let turns = clear_transcript(&state).await;
  Json(TranscriptOut { turns, busy: state.chat_slot.is_busy() })
}

// -------- Settings --------

pub async fn http_settings(State(state): State<Arc<AppState>>) -> Json<SettingsOut> {
  let credential_configured = state.progress.lock().await.credential().is_some();
  Json(SettingsOut { credential_configured, ai_model: state.ai_model.clone() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_set_credential(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CredentialIn>,
) -> AppResult<Json<SettingsOut>> {
  let credential_configured = set_credential(&state, &body.credential).await?;
  info!(target: "moet_study", credential_configured, "HTTP credential updated");
  Ok(Json(SettingsOut { credential_configured, ai_model: state.ai_model.clone() }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset(State(state): State<Arc<AppState>>) -> AppResult<Json<SettingsOut>> {
  reset_all(&state).await?;
  info!(target: "moet_study", "HTTP full reset");
  Ok(Json(SettingsOut { credential_configured: false, ai_model: state.ai_model.clone() }))
}
