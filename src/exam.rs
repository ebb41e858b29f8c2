//! Mock exam session: question selection, one-question-at-a-time flow,
//! countdown and scoring.
//!
//! Phases: `Selecting -> Active -> Results`. A session in `Results` is final;
//! starting another exam builds a new [`ExamSession`] and exiting returns a
//! fresh one in `Selecting`.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::domain::{percentage, AnswerOptions, ExamAttempt, ExamMode, Grade, OptionKey, Question};
use crate::error::ExamError;

/// Questions drawn for a quick quiz.
pub const QUICK_QUESTION_COUNT: usize = 10;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExamPhase {
  Selecting,
  Active,
  Results,
}

/// What the learner sees once an answer is recorded.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Reveal {
  pub question_id: u32,
  pub chosen: OptionKey,
  pub answer: OptionKey,
  pub correct: bool,
  pub explanation: String,
}

/// A question as shown while it is open: no correct letter.
#[derive(Clone, Debug, Serialize)]
pub struct QuestionView {
  pub id: u32,
  pub requirement: String,
  pub topic: String,
  pub text: String,
  pub options: AnswerOptions,
}

impl From<&Question> for QuestionView {
  fn from(q: &Question) -> Self {
    Self {
      id: q.id,
      requirement: q.requirement.clone(),
      topic: q.topic.clone(),
      text: q.text.clone(),
      options: q.options.clone(),
    }
  }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExamSnapshot {
  pub session_id: Uuid,
  pub phase: ExamPhase,
  pub mode: Option<ExamMode>,
  pub topic: Option<String>,
  /// Zero-based position of the open question.
  pub index: usize,
  pub total: usize,
  pub answered: usize,
  pub countdown: bool,
  pub remaining_secs: u32,
  pub elapsed_secs: u32,
  pub time_limit_secs: u32,
  pub question: Option<QuestionView>,
  pub reveal: Option<Reveal>,
  pub score: Option<u32>,
  pub grade: Option<Grade>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewItem {
  pub question_id: u32,
  pub requirement: String,
  pub text: String,
  /// `None` means unanswered.
  pub chosen: Option<OptionKey>,
  pub answer: OptionKey,
  pub answer_text: String,
  pub correct: bool,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExamReview {
  pub session_id: Uuid,
  pub mode: Option<ExamMode>,
  pub score: u32,
  pub total: u32,
  pub percentage: f64,
  pub grade: Option<Grade>,
  pub items: Vec<ReviewItem>,
}

/// Pick and order the questions for `mode`.
///
/// `topic` is only consulted in topic mode; a code with no questions yields an
/// empty selection.
pub fn select_questions<R: Rng + ?Sized>(
  catalog: &Catalog,
  mode: ExamMode,
  topic: Option<&str>,
  rng: &mut R,
) -> Vec<Question> {
  let bank = catalog.questions();
  let mut picked: Vec<Question> = match mode {
    ExamMode::Full => bank.to_vec(),
    ExamMode::Quick => bank
      .choose_multiple(rng, QUICK_QUESTION_COUNT.min(bank.len()))
      .cloned()
      .collect(),
    ExamMode::Topic => {
      let code = topic.unwrap_or_default();
      catalog.questions_for(code).cloned().collect()
    }
  };
  picked.shuffle(rng);
  picked
}

#[derive(Clone, Debug)]
pub struct ExamSession {
  id: Uuid,
  phase: ExamPhase,
  mode: Option<ExamMode>,
  topic: Option<String>,
  questions: Vec<Question>,
  index: usize,
  answers: HashMap<u32, OptionKey>,
  time_limit_secs: u32,
  remaining_secs: u32,
  countdown: bool,
}

impl Default for ExamSession {
  fn default() -> Self {
    Self {
      id: Uuid::new_v4(),
      phase: ExamPhase::Selecting,
      mode: None,
      topic: None,
      questions: Vec::new(),
      index: 0,
      answers: HashMap::new(),
      time_limit_secs: 0,
      remaining_secs: 0,
      countdown: false,
    }
  }
}

impl ExamSession {
  /// Build an `Active` session for `mode`.
  ///
  /// An empty selection goes straight to `Results` and produces no attempt.
  pub fn start<R: Rng + ?Sized>(
    catalog: &Catalog,
    mode: ExamMode,
    topic: Option<&str>,
    rng: &mut R,
  ) -> Self {
    let questions = select_questions(catalog, mode, topic, rng);
    Self::with_questions(mode, topic.map(str::to_string), questions)
  }

  pub(crate) fn with_questions(mode: ExamMode, topic: Option<String>, questions: Vec<Question>) -> Self {
    let limit = mode.time_limit_secs();
    let phase = if questions.is_empty() { ExamPhase::Results } else { ExamPhase::Active };
    let session = Self {
      id: Uuid::new_v4(),
      phase,
      mode: Some(mode),
      topic: topic.filter(|_| mode == ExamMode::Topic),
      questions,
      index: 0,
      answers: HashMap::new(),
      time_limit_secs: limit,
      remaining_secs: limit,
      countdown: mode.countdown_enabled(),
    };
    info!(
      target: "exam",
      session = %session.id,
      %mode,
      topic = ?session.topic,
      total = session.questions.len(),
      countdown = session.countdown,
      "Exam started"
    );
    session
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn phase(&self) -> ExamPhase {
    self.phase
  }

  pub fn total(&self) -> usize {
    self.questions.len()
  }

  pub fn remaining_secs(&self) -> u32 {
    self.remaining_secs
  }

  pub fn elapsed_secs(&self) -> u32 {
    self.time_limit_secs - self.remaining_secs
  }

  pub fn time_limit_secs(&self) -> u32 {
    self.time_limit_secs
  }

  /// True while the one-second clock should be driving this session.
  pub fn is_counting_down(&self) -> bool {
    self.phase == ExamPhase::Active && self.countdown
  }

  pub fn current_question(&self) -> Option<&Question> {
    match self.phase {
      ExamPhase::Active => self.questions.get(self.index),
      _ => None,
    }
  }

  pub fn recorded_answer(&self, question_id: u32) -> Option<OptionKey> {
    self.answers.get(&question_id).copied()
  }

  /// Number of questions whose recorded answer matches the key.
  pub fn score(&self) -> u32 {
    self.questions
      .iter()
      .filter(|q| self.answers.get(&q.id).is_some_and(|a| q.is_correct(*a)))
      .count() as u32
  }

  fn reveal_for(&self, q: &Question) -> Option<Reveal> {
    self.answers.get(&q.id).map(|chosen| Reveal {
      question_id: q.id,
      chosen: *chosen,
      answer: q.answer,
      correct: q.is_correct(*chosen),
      explanation: q.explanation.clone(),
    })
  }

  /// Record `option` for the open question and reveal the outcome.
  ///
  /// The first answer is final: later calls return the original reveal.
  pub fn answer(&mut self, option: OptionKey) -> Result<Reveal, ExamError> {
    let q = self.current_question().ok_or(ExamError::NotActive(self.phase))?.clone();
    if let Some(existing) = self.reveal_for(&q) {
      debug!(target: "exam", session = %self.id, question = q.id, ignored = %option, "Answer already recorded");
      return Ok(existing);
    }
    self.answers.insert(q.id, option);
    let reveal = self.reveal_for(&q).ok_or(ExamError::NotRevealed)?;
    debug!(target: "exam", session = %self.id, question = q.id, correct = reveal.correct, "Answer recorded");
    Ok(reveal)
  }

  /// Move past a revealed question. Returns the attempt when this finishes the exam.
  pub fn advance(&mut self) -> Result<Option<ExamAttempt>, ExamError> {
    let q = self.current_question().ok_or(ExamError::NotActive(self.phase))?;
    if !self.answers.contains_key(&q.id) {
      return Err(ExamError::NotRevealed);
    }
    if self.index + 1 < self.questions.len() {
      self.index += 1;
      Ok(None)
    } else {
      Ok(self.finish())
    }
  }

  /// One second of countdown. Returns the attempt when time runs out.
  pub fn tick(&mut self) -> Option<ExamAttempt> {
    if !self.is_counting_down() {
      return None;
    }
    self.remaining_secs = self.remaining_secs.saturating_sub(1);
    if self.remaining_secs == 0 {
      info!(target: "exam", session = %self.id, answered = self.answers.len(), total = self.questions.len(), "Time expired");
      return self.finish();
    }
    None
  }

  fn finish(&mut self) -> Option<ExamAttempt> {
    self.phase = ExamPhase::Results;
    let total = self.questions.len() as u32;
    if total == 0 {
      return None;
    }
    let score = self.score();
    let requirements: BTreeSet<String> = self.questions
      .iter()
      .filter(|q| self.answers.contains_key(&q.id))
      .map(|q| q.requirement.clone())
      .collect();
    let mode = self.mode.unwrap_or(ExamMode::Full);
    info!(
      target: "exam",
      session = %self.id,
      %mode,
      score,
      total,
      grade = ?Grade::from_score(score, total),
      "Exam finished"
    );
    Some(ExamAttempt {
      score,
      total,
      date: Utc::now(),
      mode,
      requirements: requirements.into_iter().collect(),
    })
  }

  pub fn snapshot(&self) -> ExamSnapshot {
    let current = self.current_question();
    let results = self.phase == ExamPhase::Results;
    let total = self.questions.len() as u32;
    ExamSnapshot {
      session_id: self.id,
      phase: self.phase,
      mode: self.mode,
      topic: self.topic.clone(),
      index: self.index,
      total: self.questions.len(),
      answered: self.answers.len(),
      countdown: self.countdown,
      remaining_secs: self.remaining_secs,
      elapsed_secs: self.elapsed_secs(),
      time_limit_secs: self.time_limit_secs,
      question: current.map(QuestionView::from),
      reveal: current.and_then(|q| self.reveal_for(q)),
      score: results.then(|| self.score()),
      grade: if results { Grade::from_score(self.score(), total) } else { None },
    }
  }

  /// Per-question outcome, available once the session is in `Results`.
  pub fn review(&self) -> Result<ExamReview, ExamError> {
    if self.phase != ExamPhase::Results {
      return Err(ExamError::NoResults(self.phase));
    }
    let score = self.score();
    let total = self.questions.len() as u32;
    let items = self.questions
      .iter()
      .map(|q| {
        let chosen = self.recorded_answer(q.id);
        ReviewItem {
          question_id: q.id,
          requirement: q.requirement.clone(),
          text: q.text.clone(),
          chosen,
          answer: q.answer,
          answer_text: q.options.get(q.answer).to_string(),
          correct: chosen.is_some_and(|c| q.is_correct(c)),
          explanation: q.explanation.clone(),
        }
      })
      .collect();
    Ok(ExamReview {
      session_id: self.id,
      mode: self.mode,
      score,
      total,
      percentage: percentage(score, total),
      grade: Grade::from_score(score, total),
      items,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn catalog() -> Catalog {
    Catalog::embedded().expect("catalog")
  }

  fn wrong(q: &Question) -> OptionKey {
    OptionKey::ALL.into_iter().find(|k| *k != q.answer).unwrap()
  }

  fn answer_current(s: &mut ExamSession, correct: bool) -> Reveal {
    let q = s.current_question().unwrap().clone();
    let opt = if correct { q.answer } else { wrong(&q) };
    s.answer(opt).unwrap()
  }

  #[test]
  fn new_session_is_selecting() {
    let s = ExamSession::default();
    assert_eq!(s.phase(), ExamPhase::Selecting);
    assert!(s.current_question().is_none());
    assert_eq!(s.clone().answer(OptionKey::A), Err(ExamError::NotActive(ExamPhase::Selecting)));
  }

  #[test]
  fn full_mode_uses_whole_bank_with_countdown() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(7);
    let s = ExamSession::start(&c, ExamMode::Full, None, &mut rng);
    assert_eq!(s.phase(), ExamPhase::Active);
    assert_eq!(s.total(), c.questions().len());
    assert_eq!(s.remaining_secs(), 45 * 60);
    assert!(s.is_counting_down());

    let mut ids: Vec<u32> = s.questions.iter().map(|q| q.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), c.questions().len());
  }

  #[test]
  fn quick_mode_samples_ten_distinct_questions() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(11);
    let s = ExamSession::start(&c, ExamMode::Quick, None, &mut rng);
    assert_eq!(s.total(), QUICK_QUESTION_COUNT);
    let ids: BTreeSet<u32> = s.questions.iter().map(|q| q.id).collect();
    assert_eq!(ids.len(), QUICK_QUESTION_COUNT);
    assert_eq!(s.remaining_secs(), 15 * 60);
    assert!(s.is_counting_down());
  }

  #[test]
  fn topic_mode_filters_by_code_without_countdown() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(3);
    let mut s = ExamSession::start(&c, ExamMode::Topic, Some("K2"), &mut rng);
    assert!(s.total() > 0);
    assert!(s.questions.iter().all(|q| q.requirement == "K2"));
    assert_eq!(s.remaining_secs(), 20 * 60);
    assert!(!s.is_counting_down());
    assert_eq!(s.tick(), None);
    assert_eq!(s.remaining_secs(), 20 * 60);
  }

  #[test]
  fn same_seed_same_order() {
    let c = catalog();
    let a = select_questions(&c, ExamMode::Full, None, &mut StdRng::seed_from_u64(42));
    let b = select_questions(&c, ExamMode::Full, None, &mut StdRng::seed_from_u64(42));
    let ids = |v: &[Question]| v.iter().map(|q| q.id).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
  }

  #[test]
  fn empty_topic_is_an_empty_exam_not_a_crash() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(1);
    let mut s = ExamSession::start(&c, ExamMode::Topic, Some("B1"), &mut rng);
    assert_eq!(s.total(), 0);
    assert_eq!(s.phase(), ExamPhase::Results);
    assert_eq!(s.tick(), None);
    let review = s.review().unwrap();
    assert_eq!(review.total, 0);
    assert_eq!(review.grade, None);
    assert_eq!(s.snapshot().grade, None);
  }

  #[test]
  fn first_answer_is_final() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(5);
    let mut s = ExamSession::start(&c, ExamMode::Quick, None, &mut rng);
    let q = s.current_question().unwrap().clone();

    let first = s.answer(wrong(&q)).unwrap();
    assert!(!first.correct);
    let second = s.answer(q.answer).unwrap();
    assert_eq!(second, first);
    assert_eq!(s.recorded_answer(q.id), Some(wrong(&q)));
  }

  #[test]
  fn cannot_advance_before_reveal() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(5);
    let mut s = ExamSession::start(&c, ExamMode::Quick, None, &mut rng);
    assert_eq!(s.advance(), Err(ExamError::NotRevealed));
    answer_current(&mut s, true);
    assert_eq!(s.advance(), Ok(None));
    assert_eq!(s.snapshot().index, 1);
    assert!(s.snapshot().reveal.is_none());
  }

  #[test]
  fn quick_exam_one_correct_is_a_fail() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(99);
    let mut s = ExamSession::start(&c, ExamMode::Quick, None, &mut rng);

    answer_current(&mut s, true);
    let mut attempt = s.advance().unwrap();
    while attempt.is_none() {
      answer_current(&mut s, false);
      attempt = s.advance().unwrap();
    }

    let attempt = attempt.unwrap();
    assert_eq!(attempt.score, 1);
    assert_eq!(attempt.total, 10);
    assert_eq!(attempt.mode, ExamMode::Quick);
    assert_eq!(Grade::from_score(attempt.score, attempt.total), Some(Grade::Fail));
    assert_eq!(s.phase(), ExamPhase::Results);
    assert!(s.advance().is_err());
  }

  #[test]
  fn timeout_scores_only_recorded_answers() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(21);
    let mut s = ExamSession::start(&c, ExamMode::Quick, None, &mut rng);

    // two right, one wrong, then the clock runs out
    for correct in [true, false, true] {
      answer_current(&mut s, correct);
      assert_eq!(s.advance().unwrap(), None);
    }

    let mut attempt = None;
    for _ in 0..(15 * 60) {
      if let Some(a) = s.tick() {
        attempt = Some(a);
        break;
      }
    }
    let attempt = attempt.expect("timer should finish the exam");
    assert_eq!(attempt.total, 10);
    assert_eq!(attempt.score, 2);
    assert_eq!(s.phase(), ExamPhase::Results);
    assert_eq!(s.remaining_secs(), 0);
    assert_eq!(s.elapsed_secs(), 15 * 60);

    let review = s.review().unwrap();
    assert_eq!(review.items.iter().filter(|i| i.chosen.is_none()).count(), 7);
    assert_eq!(review.items.iter().filter(|i| i.correct).count(), 2);
  }

  #[test]
  fn score_stays_within_bounds() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(8);
    let mut s = ExamSession::start(&c, ExamMode::Topic, Some("K4"), &mut rng);
    let total = s.total() as u32;
    let mut i = 0;
    loop {
      answer_current(&mut s, i % 3 == 0);
      assert!(s.score() <= total);
      i += 1;
      if s.advance().unwrap().is_some() {
        break;
      }
    }
    let expected = (0..total).filter(|n| n % 3 == 0).count() as u32;
    assert_eq!(s.score(), expected);
  }

  #[test]
  fn attempt_lists_answered_requirements() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(2);
    let mut s = ExamSession::start(&c, ExamMode::Topic, Some("K3"), &mut rng);
    let attempt = loop {
      answer_current(&mut s, false);
      if let Some(a) = s.advance().unwrap() {
        break a;
      }
    };
    assert_eq!(attempt.requirements, vec!["K3".to_string()]);
  }

  #[test]
  fn snapshot_hides_answer_until_revealed() {
    let c = catalog();
    let mut rng = StdRng::seed_from_u64(4);
    let mut s = ExamSession::start(&c, ExamMode::Full, None, &mut rng);
    let snap = s.snapshot();
    assert!(snap.question.is_some());
    assert!(snap.reveal.is_none());
    let json = serde_json::to_value(&snap).unwrap();
    assert!(json["question"].get("answer").is_none());

    answer_current(&mut s, true);
    assert!(s.snapshot().reveal.unwrap().correct);
  }
}
