//! Learner progress: studied set, attempt history, portfolio documents and the
//! AI credential, hydrated from a [`SlotStore`] and written back on every change.
//!
//! Mutations build the new slot value, save it, and only then replace the
//! in-memory copy, so a failed write leaves memory matching the slot.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{ExamAttempt, PortfolioDocument};
use crate::error::StoreError;
use crate::store::{Slot, SlotStore};
use crate::util::now_millis;

pub struct Progress {
  store: Arc<dyn SlotStore>,
  /// Codes in the order they were marked studied.
  studied: Vec<String>,
  attempts: Vec<ExamAttempt>,
  documents: Vec<PortfolioDocument>,
  credential: String,
  /// Bumped on reset so late AI responses can tell the world moved on.
  epoch: u64,
}

/// Deserialize a slot, falling back to the default when absent or corrupt.
fn load_slot<T: DeserializeOwned + Default>(store: &dyn SlotStore, slot: Slot) -> T {
  let Some(raw) = store.load(slot.key()) else {
    return T::default();
  };
  match serde_json::from_str(&raw) {
    Ok(v) => v,
    Err(e) => {
      warn!(target: "store", key = slot.key(), error = %e, "Corrupt slot; using empty default");
      T::default()
    }
  }
}

/// Keep the first occurrence of each code.
fn dedup_in_order(codes: Vec<String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(codes.len());
  for code in codes {
    if !out.contains(&code) {
      out.push(code);
    }
  }
  out
}

/// Drop history entries that cannot be a real result.
fn valid_attempts(attempts: Vec<ExamAttempt>) -> Vec<ExamAttempt> {
  let before = attempts.len();
  let kept: Vec<ExamAttempt> = attempts.into_iter().filter(|a| a.total > 0 && a.score <= a.total).collect();
  if kept.len() != before {
    warn!(target: "store", dropped = before - kept.len(), "Invalid attempts in history; ignoring them");
  }
  kept
}

impl Progress {
  #[instrument(level = "info", skip_all)]
  pub fn hydrate(store: Arc<dyn SlotStore>) -> Self {
    let studied = dedup_in_order(load_slot(store.as_ref(), Slot::Studied));
    let attempts = valid_attempts(load_slot(store.as_ref(), Slot::Attempts));
    let documents: Vec<PortfolioDocument> = load_slot(store.as_ref(), Slot::Portfolio);
    let credential: String = load_slot(store.as_ref(), Slot::Credential);
    info!(
      target: "store",
      studied = studied.len(),
      attempts = attempts.len(),
      documents = documents.len(),
      credential = !credential.is_empty(),
      "Progress hydrated"
    );
    Self {
      store,
      studied,
      attempts,
      documents,
      credential,
      epoch: 0,
    }
  }

  fn persist<T: Serialize + ?Sized>(&self, slot: Slot, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    self.store.save(slot.key(), &json)
  }

  /// Save `documents` and adopt them.
  fn commit_documents(&mut self, documents: Vec<PortfolioDocument>) -> Result<(), StoreError> {
    self.persist(Slot::Portfolio, &documents)?;
    self.documents = documents;
    Ok(())
  }

  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  // --- studied set ---

  pub fn studied(&self) -> &[String] {
    &self.studied
  }

  pub fn is_studied(&self, code: &str) -> bool {
    self.studied.iter().any(|c| c == code)
  }

  /// Flip membership; returns the new state. Newly studied codes go last.
  pub fn toggle_studied(&mut self, code: &str) -> Result<bool, StoreError> {
    let now_studied = !self.is_studied(code);
    let next: Vec<String> = if now_studied {
      self.studied.iter().cloned().chain(std::iter::once(code.to_string())).collect()
    } else {
      self.studied.iter().filter(|c| *c != code).cloned().collect()
    };
    self.persist(Slot::Studied, &next)?;
    self.studied = next;
    Ok(now_studied)
  }

  // --- attempts ---

  pub fn attempts(&self) -> &[ExamAttempt] {
    &self.attempts
  }

  pub fn record_attempt(&mut self, attempt: ExamAttempt) -> Result<(), StoreError> {
    let mut next = self.attempts.clone();
    next.push(attempt);
    self.persist(Slot::Attempts, &next)?;
    self.attempts = next;
    Ok(())
  }

  // --- portfolio documents ---

  pub fn documents(&self) -> &[PortfolioDocument] {
    &self.documents
  }

  pub fn document(&self, id: i64) -> Option<&PortfolioDocument> {
    self.documents.iter().find(|d| d.id == id)
  }

  /// New empty document. Ids are creation timestamps, bumped past the newest
  /// existing id so two creations in the same millisecond stay unique.
  pub fn create_document(&mut self) -> Result<PortfolioDocument, StoreError> {
    let newest = self.documents.iter().map(|d| d.id).max().unwrap_or(i64::MIN);
    let id = now_millis().max(newest.saturating_add(1));
    let doc = PortfolioDocument::new(id);
    let mut next = self.documents.clone();
    next.push(doc.clone());
    self.commit_documents(next)?;
    info!(target: "portfolio", id, "Portfolio document created");
    Ok(doc)
  }

  /// Apply `edit` to document `id` and persist. `None` if no such document.
  fn edit_document<F>(&mut self, id: i64, edit: F) -> Result<Option<PortfolioDocument>, StoreError>
  where
    F: FnOnce(&mut PortfolioDocument, i64),
  {
    let mut next = self.documents.clone();
    let Some(doc) = next.iter_mut().find(|d| d.id == id) else {
      return Ok(None);
    };
    edit(doc, now_millis());
    let updated = doc.clone();
    self.commit_documents(next)?;
    Ok(Some(updated))
  }

  pub fn set_title(&mut self, id: i64, title: String) -> Result<Option<PortfolioDocument>, StoreError> {
    self.edit_document(id, |doc, now| doc.set_title(title, now))
  }

  pub fn set_section_text(
    &mut self,
    id: i64,
    section_id: &str,
    text: String,
  ) -> Result<Option<PortfolioDocument>, StoreError> {
    self.edit_document(id, |doc, now| doc.set_section(section_id, text, now))
  }

  /// Returns whether a document was removed.
  pub fn delete_document(&mut self, id: i64) -> Result<bool, StoreError> {
    if self.document(id).is_none() {
      return Ok(false);
    }
    let next = self.documents.iter().filter(|d| d.id != id).cloned().collect();
    self.commit_documents(next)?;
    info!(target: "portfolio", id, "Portfolio document deleted");
    Ok(true)
  }

  // --- credential ---

  /// The stored credential, or `None` when not configured.
  pub fn credential(&self) -> Option<&str> {
    let c = self.credential.trim();
    (!c.is_empty()).then_some(c)
  }

  pub fn set_credential(&mut self, credential: &str) -> Result<(), StoreError> {
    let next = credential.trim().to_string();
    self.persist(Slot::Credential, &next)?;
    self.credential = next;
    Ok(())
  }

  /// Wipe every slot and reload the empty state.
  #[instrument(level = "info", skip(self))]
  pub fn reset(&mut self) -> Result<(), StoreError> {
    self.store.clear()?;
    let epoch = self.epoch + 1;
    *self = Self::hydrate(self.store.clone());
    self.epoch = epoch;
    warn!(target: "store", epoch, "All progress cleared");
    Ok(())
  }
}
