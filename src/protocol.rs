//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Category, ExamMode, OptionKey};
use crate::exam::{ExamSnapshot, Reveal};
use crate::tutor::Turn;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ExamStart {
        mode: ExamMode,
        #[serde(default)]
        topic: Option<String>,
    },
    ExamAnswer {
        option: OptionKey,
    },
    ExamNext,
    ExamExit,
    ExamStatus,
    TutorMessage {
        text: String,
    },
    TagText {
        text: String,
    },
}

impl ClientWsMessage {
    /// Wire name of the message, for logs that must not carry learner text.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::ExamStart { .. } => "exam_start",
            ClientWsMessage::ExamAnswer { .. } => "exam_answer",
            ClientWsMessage::ExamNext => "exam_next",
            ClientWsMessage::ExamExit => "exam_exit",
            ClientWsMessage::ExamStatus => "exam_status",
            ClientWsMessage::TutorMessage { .. } => "tutor_message",
            ClientWsMessage::TagText { .. } => "tag_text",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Exam {
        exam: ExamSnapshot,
    },
    AnswerResult {
        reveal: Reveal,
    },
    /// Pushed once a second while a countdown runs.
    ExamClock {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        remaining_secs: u32,
        elapsed_secs: u32,
        total_secs: u32,
    },
    /// Pushed when the session reaches results (last answer or time out).
    ExamFinished {
        exam: ExamSnapshot,
    },
    Transcript {
        turns: Vec<Turn>,
    },
    Tags {
        text: String,
        requirements: Vec<String>,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<Category>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    pub requirement: Option<String>,
}

#[derive(Serialize)]
pub struct StudiedOut {
    pub id: String,
    pub studied: bool,
}

#[derive(Debug, Deserialize)]
pub struct StartExamIn {
    pub mode: ExamMode,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub option: OptionKey,
}

#[derive(Deserialize)]
pub struct TitleIn {
    pub title: String,
}

#[derive(Deserialize)]
pub struct SectionIn {
    pub text: String,
}

#[derive(Serialize)]
pub struct DeletedOut {
    pub deleted: bool,
}

#[derive(Deserialize)]
pub struct TagIn {
    pub text: String,
}
#[derive(Serialize)]
pub struct TagOut {
    pub requirements: Vec<String>,
}

#[derive(Deserialize)]
pub struct TutorIn {
    pub text: String,
}
#[derive(Serialize)]
pub struct TranscriptOut {
    pub turns: Vec<Turn>,
    pub busy: bool,
}

#[derive(Deserialize)]
pub struct CredentialIn {
    pub credential: String,
}
#[derive(Serialize)]
pub struct SettingsOut {
    pub credential_configured: bool,
    pub ai_model: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
