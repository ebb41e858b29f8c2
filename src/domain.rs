//! Domain models: requirement entries, questions, portfolio templates and the
//! persisted learner records (exam attempts, portfolio documents).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum authored length (exclusive) for a portfolio section to count as complete.
pub const SECTION_COMPLETE_CHARS: usize = 50;

/// Which part of the standard a requirement belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Knowledge,
  Skill,
  Behaviour,
}

/// End-point assessment method a requirement is graded by.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMethod {
  KnowledgeTest,
  PracticalObservation,
  TechnicalInterview,
}

/// One knowledge/skill/behaviour requirement (e.g. "K1").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequirementEntry {
  pub id: String,
  pub category: Category,
  pub title: String,
  pub description: String,
  pub assessed_by: Vec<AssessmentMethod>,
  pub key_points: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub specialism: Option<String>,
}

/// Answer letter of a multiple-choice question.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
  A,
  B,
  C,
  D,
}

impl OptionKey {
  pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

  pub fn as_str(self) -> &'static str {
    match self {
      OptionKey::A => "a",
      OptionKey::B => "b",
      OptionKey::C => "c",
      OptionKey::D => "d",
    }
  }
}

impl fmt::Display for OptionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerOptions {
  pub a: String,
  pub b: String,
  pub c: String,
  pub d: String,
}

impl AnswerOptions {
  pub fn get(&self, key: OptionKey) -> &str {
    match key {
      OptionKey::A => &self.a,
      OptionKey::B => &self.b,
      OptionKey::C => &self.c,
      OptionKey::D => &self.d,
    }
  }
}

/// Multiple-choice question tagged to one requirement code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub id: u32,
  /// Requirement code; not enforced against the catalog at the type level.
  pub requirement: String,
  pub topic: String,
  pub text: String,
  pub options: AnswerOptions,
  pub answer: OptionKey,
  pub explanation: String,
}

impl Question {
  pub fn is_correct(&self, chosen: OptionKey) -> bool {
    self.answer == chosen
  }
}

/// Narrative section of a portfolio piece.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortfolioSectionTemplate {
  pub id: String,
  pub title: String,
  pub prompt: String,
  pub placeholder: String,
  pub requirements: Vec<String>,
}

/// Which flavour of mock exam was taken.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
  Full,
  Quick,
  Topic,
}

impl ExamMode {
  /// Time limit in seconds.
  pub fn time_limit_secs(self) -> u32 {
    match self {
      ExamMode::Full => 45 * 60,
      ExamMode::Quick => 15 * 60,
      ExamMode::Topic => 20 * 60,
    }
  }

  /// Topic practice is untimed; the limit is informational only.
  pub fn countdown_enabled(self) -> bool {
    !matches!(self, ExamMode::Topic)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ExamMode::Full => "full",
      ExamMode::Quick => "quick",
      ExamMode::Topic => "topic",
    }
  }
}

impl fmt::Display for ExamMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Grade band for a knowledge-test percentage.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
  Fail,
  Pass,
  Merit,
  Distinction,
}

impl Grade {
  pub const PASS_PCT: f64 = 60.0;
  pub const MERIT_PCT: f64 = 75.0;
  pub const DISTINCTION_PCT: f64 = 85.0;

  /// Lower bounds are inclusive.
  pub fn from_percentage(pct: f64) -> Self {
    if pct >= Self::DISTINCTION_PCT {
      Grade::Distinction
    } else if pct >= Self::MERIT_PCT {
      Grade::Merit
    } else if pct >= Self::PASS_PCT {
      Grade::Pass
    } else {
      Grade::Fail
    }
  }

  /// `None` when there is nothing to grade.
  pub fn from_score(score: u32, total: u32) -> Option<Self> {
    if total == 0 {
      return None;
    }
    Some(Self::from_percentage(percentage(score, total)))
  }
}

pub fn percentage(score: u32, total: u32) -> f64 {
  if total == 0 {
    0.0
  } else {
    f64::from(score) / f64::from(total) * 100.0
  }
}

/// A finished mock exam. Append-only history entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExamAttempt {
  pub score: u32,
  pub total: u32,
  pub date: DateTime<Utc>,
  pub mode: ExamMode,
  /// Requirement codes of the questions answered in this attempt.
  #[serde(default)]
  pub requirements: Vec<String>,
}

impl ExamAttempt {
  pub fn percentage(&self) -> f64 {
    percentage(self.score, self.total)
  }
}

/// A learner-authored portfolio piece.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDocument {
  /// Creation time in epoch milliseconds, unique within the store.
  pub id: i64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub sections: BTreeMap<String, String>,
  #[serde(default)]
  pub completed_sections: BTreeSet<String>,
  pub last_modified: i64,
}

impl PortfolioDocument {
  pub fn new(id: i64) -> Self {
    Self {
      id,
      title: String::new(),
      sections: BTreeMap::new(),
      completed_sections: BTreeSet::new(),
      last_modified: id,
    }
  }

  /// Replace a section's text and recompute its completion flag.
  pub fn set_section(&mut self, section_id: &str, text: String, now_ms: i64) {
    if text.chars().count() > SECTION_COMPLETE_CHARS {
      self.completed_sections.insert(section_id.to_string());
    } else {
      self.completed_sections.remove(section_id);
    }
    self.sections.insert(section_id.to_string(), text);
    self.last_modified = now_ms;
  }

  pub fn set_title(&mut self, title: String, now_ms: i64) {
    self.title = title;
    self.last_modified = now_ms;
  }

  pub fn section_text(&self, section_id: &str) -> &str {
    self.sections.get(section_id).map(String::as_str).unwrap_or("")
  }

  /// All authored text joined with single spaces, in section-id order.
  pub fn full_text(&self) -> String {
    self.sections.values().map(String::as_str).collect::<Vec<_>>().join(" ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grade_bands_are_inclusive_at_lower_bound() {
    assert_eq!(Grade::from_percentage(59.9), Grade::Fail);
    assert_eq!(Grade::from_percentage(60.0), Grade::Pass);
    assert_eq!(Grade::from_percentage(74.9), Grade::Pass);
    assert_eq!(Grade::from_percentage(75.0), Grade::Merit);
    assert_eq!(Grade::from_percentage(84.9), Grade::Merit);
    assert_eq!(Grade::from_percentage(85.0), Grade::Distinction);
    assert_eq!(Grade::from_percentage(100.0), Grade::Distinction);
  }

  #[test]
  fn empty_exam_has_no_grade() {
    assert_eq!(Grade::from_score(0, 0), None);
    assert_eq!(Grade::from_score(1, 10), Some(Grade::Fail));
  }

  #[test]
  fn section_completion_tracks_length_both_ways() {
    let mut doc = PortfolioDocument::new(1);
    doc.set_section("intro", "x".repeat(50), 2);
    assert!(!doc.completed_sections.contains("intro"));

    doc.set_section("intro", "x".repeat(51), 3);
    assert!(doc.completed_sections.contains("intro"));
    assert_eq!(doc.last_modified, 3);

    doc.set_section("intro", "short now".into(), 4);
    assert!(!doc.completed_sections.contains("intro"));
    assert_eq!(doc.section_text("intro"), "short now");
  }

  #[test]
  fn document_uses_source_storage_field_names() {
    let mut doc = PortfolioDocument::new(1_700_000_000_000);
    doc.set_title("Motor Fault".into(), 1_700_000_000_001);
    let json = serde_json::to_value(&doc).unwrap();
    assert!(json.get("completedSections").is_some());
    assert_eq!(json["lastModified"], 1_700_000_000_001_i64);
  }

  #[test]
  fn attempt_without_requirements_field_still_parses() {
    let raw = r#"{"score":7,"total":10,"date":"2024-05-01T10:00:00Z","mode":"quick"}"#;
    let a: ExamAttempt = serde_json::from_str(raw).unwrap();
    assert_eq!(a.mode, ExamMode::Quick);
    assert!(a.requirements.is_empty());
    assert!((a.percentage() - 70.0).abs() < f64::EPSILON);
  }
}
