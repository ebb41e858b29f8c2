//! Application state: catalog, learner progress, the live exam session, the
//! tutor transcript, and the AI provider.
//!
//! This module owns:
//!   - the read-only catalog (requirements, questions, section templates)
//!   - the progress container (hydrated from the slot store, saved on every change)
//!   - the single transient exam session and the shuffle RNG
//!   - the tutor transcript and one in-flight slot per AI call site
//!
//! Lock order when more than one is held: exam -> rng -> progress.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::{Prompts, Settings, StudyConfig, TutorSettings};
use crate::exam::ExamSession;
use crate::openai::OpenAI;
use crate::progress::Progress;
use crate::store::{FileSlotStore, SlotStore};
use crate::tutor::{CompletionProvider, InFlightSlot, Transcript};

pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub progress: Mutex<Progress>,
    pub exam: Mutex<ExamSession>,
    pub rng: Mutex<StdRng>,
    pub transcript: Mutex<Transcript>,
    pub provider: Arc<dyn CompletionProvider>,
    pub chat_slot: InFlightSlot,
    pub draft_slot: InFlightSlot,
    pub prompts: Prompts,
    pub tutor: TutorSettings,
    pub ai_model: String,
}

impl AppState {
    /// Build state from settings: load the catalog, open the data directory,
    /// hydrate progress and set up the AI client.
    #[instrument(level = "info", skip_all, fields(data_dir = %settings.data_dir.display()))]
    pub fn new(settings: &Settings) -> Result<Self, Box<dyn std::error::Error>> {
        let catalog = Catalog::embedded()?;
        let store = FileSlotStore::open(&settings.data_dir)?;
        info!(target: "store", dir = %store.dir().display(), "Progress slots opened");
        let openai = OpenAI::new(
            &settings.ai_base_url,
            &settings.ai_model,
            Duration::from_secs(settings.study.tutor.timeout_secs),
        )?;
        info!(target: "moet_study", base_url = %openai.base_url, model = %openai.model, "AI provider configured (credential supplied at runtime).");

        Ok(Self::from_parts(
            catalog,
            Arc::new(store),
            Arc::new(openai),
            settings.study.clone(),
            settings.ai_model.clone(),
        ))
    }

    /// Assemble state from explicit collaborators.
    pub fn from_parts(
        catalog: Catalog,
        store: Arc<dyn SlotStore>,
        provider: Arc<dyn CompletionProvider>,
        config: StudyConfig,
        ai_model: String,
    ) -> Self {
        let rng = match config.exam.seed {
            Some(seed) => {
                info!(target: "exam", seed, "Exam shuffling is seeded");
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };
        Self {
            catalog: Arc::new(catalog),
            progress: Mutex::new(Progress::hydrate(store)),
            exam: Mutex::new(ExamSession::default()),
            rng: Mutex::new(rng),
            transcript: Mutex::new(Transcript::new(&config.prompts.greeting)),
            provider,
            chat_slot: InFlightSlot::default(),
            draft_slot: InFlightSlot::default(),
            prompts: config.prompts,
            tutor: config.tutor,
            ai_model,
        }
    }
}
