//! Tutor/assist gateway plumbing: the provider seam, the chat transcript and
//! the single-slot in-flight guard each call site owns.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::util::now_millis;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Learner,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
  pub role: Role,
  pub text: String,
  pub timestamp: i64,
}

impl Turn {
  pub fn learner(text: impl Into<String>) -> Self {
    Self { role: Role::Learner, text: text.into(), timestamp: now_millis() }
  }

  pub fn assistant(text: impl Into<String>) -> Self {
    Self { role: Role::Assistant, text: text.into(), timestamp: now_millis() }
  }
}

/// "Text in, text out" request handed to the provider.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
  pub system: Option<String>,
  /// Prior turns followed by the new learner message (or a single prompt).
  pub turns: Vec<Turn>,
  pub max_output_tokens: u32,
  pub temperature: f32,
}

impl CompletionRequest {
  /// One-shot prompt with no history.
  pub fn prompt(text: impl Into<String>, max_output_tokens: u32) -> Self {
    Self {
      system: None,
      turns: vec![Turn::learner(text)],
      max_output_tokens,
      temperature: 0.7,
    }
  }
}

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GatewayError>> + Send + 'a>>;

/// External generative-language endpoint.
pub trait CompletionProvider: Send + Sync {
  fn complete<'a>(&'a self, credential: &'a str, request: CompletionRequest) -> ProviderFuture<'a>;
}

/// Visible tutor conversation. Not persisted.
#[derive(Clone, Debug)]
pub struct Transcript {
  turns: Vec<Turn>,
  generation: u64,
}

impl Transcript {
  pub fn new(greeting: &str) -> Self {
    Self { turns: vec![Turn::assistant(greeting)], generation: 0 }
  }

  pub fn turns(&self) -> &[Turn] {
    &self.turns
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// Start over with a single assistant greeting.
  pub fn clear(&mut self, greeting: &str) {
    self.turns = vec![Turn::assistant(greeting)];
    self.generation += 1;
  }

  /// Append a learner message and its reply, unless the transcript was
  /// cleared since `generation` was captured.
  pub fn append_exchange(&mut self, generation: u64, learner: Turn, reply: Turn) -> Result<(), GatewayError> {
    if generation != self.generation {
      return Err(GatewayError::Stale);
    }
    self.turns.push(learner);
    self.turns.push(reply);
    Ok(())
  }
}

/// At most one outstanding request per call site.
#[derive(Debug, Default)]
pub struct InFlightSlot {
  busy: AtomicBool,
}

impl InFlightSlot {
  pub fn try_acquire(&self) -> Result<InFlightGuard<'_>, GatewayError> {
    self.busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .map_err(|_| GatewayError::Busy)?;
    Ok(InFlightGuard { slot: self })
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }
}

/// Releases the slot when the request resolves, success or failure.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
  slot: &'a InFlightSlot,
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self.slot.busy.store(false, Ordering::Release);
  }
}
