//! Derived progress views. Nothing here is stored; everything is recomputed
//! from the catalog and the current [`Progress`].

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::domain::{Category, ExamAttempt, PortfolioDocument, RequirementEntry};
use crate::progress::Progress;
use crate::tagger;

/// A portfolio piece counts toward the target once this many sections are complete.
pub const PIECE_COMPLETE_SECTIONS: usize = 4;
/// Portfolio pieces the learner is aiming for.
pub const PORTFOLIO_TARGET: usize = 3;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
  Pending,
  Studied,
  Evidenced,
  Complete,
}

#[derive(Clone, Debug, Serialize)]
pub struct RequirementProgress {
  #[serde(flatten)]
  pub entry: RequirementEntry,
  pub status: RequirementStatus,
  pub studied: bool,
  pub evidenced: bool,
  pub tested: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrackerView {
  pub total: usize,
  pub studied: usize,
  pub evidenced: usize,
  pub complete: usize,
  pub requirements: Vec<RequirementProgress>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Dashboard {
  pub studied: usize,
  pub requirements_total: usize,
  pub studied_pct: u32,
  pub tests_taken: usize,
  pub average_score_pct: u32,
  pub last_attempt: Option<ExamAttempt>,
  pub portfolio_complete: usize,
  pub portfolio_target: usize,
  pub credential_configured: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
  #[serde(flatten)]
  pub document: PortfolioDocument,
  pub sections_complete: usize,
  pub sections_total: usize,
  pub detected_requirements: Vec<String>,
}

/// Per-requirement evidence inputs, computed once per view.
struct Evidence {
  studied: HashSet<String>,
  evidenced: HashSet<String>,
  tested: HashSet<String>,
}

impl Evidence {
  fn gather(catalog: &Catalog, progress: &Progress) -> Self {
    let portfolio_text = progress
      .documents()
      .iter()
      .map(PortfolioDocument::full_text)
      .collect::<Vec<_>>()
      .join(" ");
    Self {
      studied: progress.studied().iter().cloned().collect(),
      evidenced: tagger::tag(&portfolio_text, catalog.requirements()).into_iter().collect(),
      tested: progress.attempts().iter().flat_map(|a| a.requirements.iter().cloned()).collect(),
    }
  }

  fn status_of(&self, code: &str) -> RequirementStatus {
    let evidenced = self.evidenced.contains(code);
    if evidenced && self.tested.contains(code) {
      RequirementStatus::Complete
    } else if evidenced {
      RequirementStatus::Evidenced
    } else if self.studied.contains(code) {
      RequirementStatus::Studied
    } else {
      RequirementStatus::Pending
    }
  }

  fn progress_for(&self, entry: &RequirementEntry) -> RequirementProgress {
    RequirementProgress {
      entry: entry.clone(),
      status: self.status_of(&entry.id),
      studied: self.studied.contains(&entry.id),
      evidenced: self.evidenced.contains(&entry.id),
      tested: self.tested.contains(&entry.id),
    }
  }
}

pub fn requirement_progress(catalog: &Catalog, progress: &Progress, code: &str) -> Option<RequirementProgress> {
  let entry = catalog.requirement(code)?;
  Some(Evidence::gather(catalog, progress).progress_for(entry))
}

/// Status of every requirement (optionally one category) plus catalog-wide totals.
pub fn tracker(catalog: &Catalog, progress: &Progress, category: Option<Category>) -> TrackerView {
  let ev = Evidence::gather(catalog, progress);
  let all: Vec<RequirementStatus> = catalog.requirements().iter().map(|r| ev.status_of(&r.id)).collect();
  TrackerView {
    total: all.len(),
    studied: progress.studied().len(),
    evidenced: all
      .iter()
      .filter(|s| matches!(s, RequirementStatus::Evidenced | RequirementStatus::Complete))
      .count(),
    complete: all.iter().filter(|s| **s == RequirementStatus::Complete).count(),
    requirements: catalog.requirements_in(category).map(|r| ev.progress_for(r)).collect(),
  }
}

fn rounded_pct(part: f64, whole: f64) -> u32 {
  if whole <= 0.0 {
    0
  } else {
    (part / whole * 100.0).round() as u32
  }
}

pub fn dashboard(catalog: &Catalog, progress: &Progress) -> Dashboard {
  let attempts = progress.attempts();
  let total = catalog.requirements().len();
  let average = if attempts.is_empty() {
    0
  } else {
    (attempts.iter().map(ExamAttempt::percentage).sum::<f64>() / attempts.len() as f64).round() as u32
  };
  Dashboard {
    studied: progress.studied().len(),
    requirements_total: total,
    studied_pct: rounded_pct(progress.studied().len() as f64, total as f64),
    tests_taken: attempts.len(),
    average_score_pct: average,
    last_attempt: attempts.last().cloned(),
    portfolio_complete: progress
      .documents()
      .iter()
      .filter(|d| d.completed_sections.len() >= PIECE_COMPLETE_SECTIONS)
      .count(),
    portfolio_target: PORTFOLIO_TARGET,
    credential_configured: progress.credential().is_some(),
  }
}

pub fn document_summary(catalog: &Catalog, doc: &PortfolioDocument) -> DocumentSummary {
  DocumentSummary {
    document: doc.clone(),
    sections_complete: doc.completed_sections.len(),
    sections_total: catalog.sections().len(),
    detected_requirements: tagger::tag(&doc.full_text(), catalog.requirements()),
  }
}
