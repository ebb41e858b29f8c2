//! Runtime configuration: environment variables plus an optional TOML file
//! (prompts, tutor limits, exam seed).
//!
//! See `StudyConfig` and `Prompts` for the expected schema.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_AI_MODEL: &str = "gemini-1.5-flash";

/// Contents of the file at STUDY_CONFIG_PATH.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct StudyConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub tutor: TutorSettings,
  #[serde(default)]
  pub exam: ExamSettings,
}

/// Prompts used by the tutor and the portfolio assistant.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub tutor_system: String,
  pub greeting: String,
  pub cleared_greeting: String,
  /// Placeholders: `{prompt}`, `{draft}`, `{requirements}`.
  pub draft_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      tutor_system: "You are an AI tutor for the Level 3 Maintenance and Operations Engineering Technician (Electrical) apprenticeship. Answer clearly and accurately about KSBs, technical concepts and the end-point assessment.".into(),
      greeting: "Hello! I'm your AI Tutor for the Level 3 MOET Electrical Technician course. Ask me anything about KSBs, technical concepts, or the EPA assessment.".into(),
      cleared_greeting: "Chat cleared. How can I help you studying today?".into(),
      draft_template: "You are an expert tutor for the Level 3 Maintenance and Operations Engineering Technician apprenticeship.\nHelp the student write a portfolio entry for the section: \"{prompt}\".\nThe student has provided this context/draft: \"{draft}\".\nWrite a professional, first-person paragraph suitable for an engineering portfolio.\nFocus on evidence for these KSBs: {requirements}.\nKeep it factual, concise, and focused on the student's actions (\"I did...\", \"I checked...\").".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TutorSettings {
  pub max_output_tokens: u32,
  pub timeout_secs: u64,
}

impl Default for TutorSettings {
  fn default() -> Self {
    Self { max_output_tokens: 1000, timeout_secs: 30 }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExamSettings {
  /// Fixed shuffle seed; entropy when absent.
  #[serde(default)]
  pub seed: Option<u64>,
}

/// Everything read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
  pub addr: SocketAddr,
  pub data_dir: PathBuf,
  pub ai_base_url: String,
  pub ai_model: String,
  pub study: StudyConfig,
}

impl Settings {
  pub fn from_env() -> Self {
    let port = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(3000);
    let ip = std::env::var("BIND_ADDR")
      .ok()
      .and_then(|a| a.parse::<IpAddr>().ok())
      .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let data_dir = std::env::var("STUDY_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./study-data"));
    let ai_base_url = std::env::var("AI_BASE_URL").unwrap_or_else(|_| DEFAULT_AI_BASE_URL.into());
    let ai_model = std::env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.into());

    let mut study = load_study_config_from_env().unwrap_or_default();
    if let Some(seed) = std::env::var("EXAM_SEED").ok().and_then(|s| s.parse::<u64>().ok()) {
      study.exam.seed = Some(seed);
    }

    Self {
      addr: SocketAddr::new(ip, port),
      data_dir,
      ai_base_url: ai_base_url.trim_end_matches('/').to_string(),
      ai_model,
      study,
    }
  }
}

/// Attempt to load `StudyConfig` from STUDY_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_study_config_from_env() -> Option<StudyConfig> {
  let path = std::env::var("STUDY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<StudyConfig>(&s) {
      Ok(cfg) => {
        info!(target: "moet_study", %path, "Loaded study config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "moet_study", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "moet_study", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: StudyConfig = toml::from_str(
      r#"
        [prompts]
        greeting = "Hi"

        [exam]
        seed = 9
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.greeting, "Hi");
    assert!(cfg.prompts.draft_template.contains("{requirements}"));
    assert_eq!(cfg.tutor.max_output_tokens, 1000);
    assert_eq!(cfg.exam.seed, Some(9));
  }
}
