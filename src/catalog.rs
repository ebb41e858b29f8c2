//! Static reference data: requirement catalog, question bank and portfolio
//! section templates, embedded from `data/catalog.toml`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::{Category, Grade, PortfolioSectionTemplate, Question, RequirementEntry};

const EMBEDDED_CATALOG: &str = include_str!("../data/catalog.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("catalog parse error: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("duplicate {kind} id: {id}")]
  Duplicate { kind: &'static str, id: String },
}

/// Read-only reference data shared by every component.
#[derive(Clone, Debug, Deserialize)]
pub struct Catalog {
  requirements: Vec<RequirementEntry>,
  questions: Vec<Question>,
  sections: Vec<PortfolioSectionTemplate>,
}

/// One component of the end-point assessment.
#[derive(Clone, Debug, Serialize)]
pub struct AssessmentComponent {
  pub name: &'static str,
  pub weight_pct: u8,
  pub requirements: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct GradeBoundaries {
  pub pass: f64,
  pub merit: f64,
  pub distinction: f64,
  pub components: Vec<AssessmentComponent>,
}

impl Catalog {
  /// Parse and validate the catalog shipped with the binary.
  #[instrument(level = "info")]
  pub fn embedded() -> Result<Self, CatalogError> {
    Self::from_toml(EMBEDDED_CATALOG)
  }

  pub fn from_toml(src: &str) -> Result<Self, CatalogError> {
    let catalog: Catalog = toml::from_str(src)?;
    catalog.validate()?;
    info!(
      target: "moet_study",
      requirements = catalog.requirements.len(),
      questions = catalog.questions.len(),
      sections = catalog.sections.len(),
      "Catalog loaded"
    );
    Ok(catalog)
  }

  fn validate(&self) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for r in &self.requirements {
      if !seen.insert(r.id.as_str()) {
        return Err(CatalogError::Duplicate { kind: "requirement", id: r.id.clone() });
      }
    }

    let mut qids = HashSet::new();
    for q in &self.questions {
      if !qids.insert(q.id) {
        return Err(CatalogError::Duplicate { kind: "question", id: q.id.to_string() });
      }
      if !seen.contains(q.requirement.as_str()) {
        warn!(target: "moet_study", question = q.id, requirement = %q.requirement, "Question references unknown requirement");
      }
    }

    let mut sids = HashSet::new();
    for s in &self.sections {
      if !sids.insert(s.id.as_str()) {
        return Err(CatalogError::Duplicate { kind: "section", id: s.id.clone() });
      }
      for code in s.requirements.iter().filter(|c| !seen.contains(c.as_str())) {
        warn!(target: "moet_study", section = %s.id, requirement = %code, "Section hint references unknown requirement");
      }
    }
    Ok(())
  }

  pub fn requirements(&self) -> &[RequirementEntry] {
    &self.requirements
  }

  pub fn requirements_in(&self, category: Option<Category>) -> impl Iterator<Item = &RequirementEntry> {
    self.requirements
      .iter()
      .filter(move |r| category.map_or(true, |c| r.category == c))
  }

  pub fn requirement(&self, id: &str) -> Option<&RequirementEntry> {
    self.requirements.iter().find(|r| r.id == id)
  }

  pub fn questions(&self) -> &[Question] {
    &self.questions
  }

  pub fn questions_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Question> + 'a {
    self.questions.iter().filter(move |q| q.requirement == code)
  }

  /// Knowledge codes that have at least one question (topic practice choices).
  pub fn topic_codes(&self) -> Vec<&str> {
    self.requirements_in(Some(Category::Knowledge))
      .filter(|r| self.questions.iter().any(|q| q.requirement == r.id))
      .map(|r| r.id.as_str())
      .collect()
  }

  pub fn sections(&self) -> &[PortfolioSectionTemplate] {
    &self.sections
  }

  pub fn section(&self, id: &str) -> Option<&PortfolioSectionTemplate> {
    self.sections.iter().find(|s| s.id == id)
  }

  pub fn grade_boundaries(&self) -> GradeBoundaries {
    GradeBoundaries {
      pass: Grade::PASS_PCT,
      merit: Grade::MERIT_PCT,
      distinction: Grade::DISTINCTION_PCT,
      components: vec![
        AssessmentComponent { name: "Knowledge Test", weight_pct: 20, requirements: "K1–K4" },
        AssessmentComponent { name: "Practical Observation", weight_pct: 40, requirements: "S1–S12, B1–B4, B6–B7" },
        AssessmentComponent { name: "Technical Interview", weight_pct: 40, requirements: "K1–K4, S2/S4/S6/S8/S9–S12, B5" },
      ],
    }
  }
}
