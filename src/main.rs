//! MOET Study · Level 3 apprenticeship study companion backend
//!
//! - Axum HTTP + WebSocket API
//! - Mock knowledge-test exams with a server-side countdown
//! - Portfolio drafting with requirement tagging and optional AI assist
//! - AI tutor chat via an OpenAI-compatible endpoint (credential set at runtime)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   BIND_ADDR         : listen address (default 127.0.0.1)
//!   STUDY_DATA_DIR    : where progress slots are kept (default ./study-data)
//!   STUDY_CONFIG_PATH : path to TOML config (prompts, tutor limits, exam seed)
//!   AI_BASE_URL       : default Gemini's OpenAI-compatible endpoint
//!   AI_MODEL          : default "gemini-1.5-flash"
//!   EXAM_SEED         : fixed seed for question shuffling
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod catalog;
mod exam;
mod tagger;
mod store;
mod progress;
mod tracker;
mod tutor;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();

  // Catalog, persisted progress, AI client, prompts.
  let state = Arc::new(AppState::new(&settings)?);

  // The exam countdown runs server-side regardless of connected clients.
  tokio::spawn(logic::run_exam_clock(state.clone()));

  let app = build_router(state);

  let listener = TcpListener::bind(settings.addr).await?;
  info!(target: "moet_study", addr = %settings.addr, data_dir = %settings.data_dir.display(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "moet_study", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "moet_study", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "moet_study", "Shutdown requested");
}
