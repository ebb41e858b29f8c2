//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request,
//! and push `exam_clock` / `exam_finished` from a once-a-second watch.

use std::sync::Arc;
use std::time::Duration;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::time::MissedTickBehavior;
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::exam::{ExamPhase, ExamSnapshot};
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "moet_study", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Last session phase this connection has seen, so `exam_finished` goes out once.
#[derive(Default)]
struct ExamWatch {
  seen: Option<(Uuid, ExamPhase)>,
}

impl ExamWatch {
  fn observe(&mut self, snap: &ExamSnapshot) -> bool {
    let was_active = self.seen == Some((snap.session_id, ExamPhase::Active));
    self.seen = Some((snap.session_id, snap.phase));
    was_active && snap.phase == ExamPhase::Results
  }

  /// What to push on a clock second, if anything.
  fn on_tick(&mut self, snap: ExamSnapshot) -> Option<ServerWsMessage> {
    if self.observe(&snap) {
      return Some(ServerWsMessage::ExamFinished { exam: snap });
    }
    (snap.phase == ExamPhase::Active && snap.countdown).then(|| ServerWsMessage::ExamClock {
      session_id: snap.session_id,
      remaining_secs: snap.remaining_secs,
      elapsed_secs: snap.elapsed_secs,
      total_secs: snap.time_limit_secs,
    })
  }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "moet_study", "WebSocket connected");
  let mut watch = ExamWatch::default();
  watch.observe(&exam_snapshot(&state).await);
  let mut clock = tokio::time::interval(Duration::from_secs(1));
  clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "moet_study", kind = incoming.kind(), "WS received");
                handle_client_ws(incoming, &state).await
              }
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if let ServerWsMessage::Exam { exam } | ServerWsMessage::ExamFinished { exam } = &reply_msg {
              watch.observe(exam);
            }
            if let Err(e) = send(&mut socket, &reply_msg).await {
              error!(target: "moet_study", error = %e, "WS send error");
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      _ = clock.tick() => {
        let Some(push) = watch.on_tick(exam_snapshot(&state).await) else { continue };
        if let Err(e) = send(&mut socket, &push).await {
          error!(target: "moet_study", error = %e, "WS push error");
          break;
        }
      }
    }
  }
  info!(target: "moet_study", "WebSocket disconnected");
}

#[instrument(level = "info", skip_all, fields(kind = msg.kind()))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::ExamStart { mode, topic } => start_exam(state, mode, topic.as_deref())
      .await
      .map(|exam| {
        info!(target: "exam", session = %exam.session_id, %mode, total = exam.total, "WS exam started");
        ServerWsMessage::Exam { exam }
      }),

    ClientWsMessage::ExamAnswer { option } => answer_exam(state, option)
      .await
      .map(|reveal| ServerWsMessage::AnswerResult { reveal }),

    ClientWsMessage::ExamNext => next_exam(state).await.map(|exam| {
      if exam.phase == ExamPhase::Results {
        ServerWsMessage::ExamFinished { exam }
      } else {
        ServerWsMessage::Exam { exam }
      }
    }),

    ClientWsMessage::ExamExit => Ok(ServerWsMessage::Exam { exam: exit_exam(state).await }),

    ClientWsMessage::ExamStatus => Ok(ServerWsMessage::Exam { exam: exam_snapshot(state).await }),

    ClientWsMessage::TutorMessage { text } => tutor_message(state, &text)
      .await
      .map(|turns| ServerWsMessage::Transcript { turns }),

    ClientWsMessage::TagText { text } => {
      let requirements = tag_text(state, &text);
      Ok(ServerWsMessage::Tags { text, requirements })
    }
  };
  result.unwrap_or_else(|e| ServerWsMessage::Error { message: e.to_string() })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ExamMode;
  use crate::logic::tests::{state_with, FakeProvider};

  #[tokio::test]
  async fn dispatch_replies_per_message() {
    let (_, state) = state_with(FakeProvider::default());
    assert!(matches!(handle_client_ws(ClientWsMessage::Ping, &state).await, ServerWsMessage::Pong));

    let reply = handle_client_ws(ClientWsMessage::ExamNext, &state).await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));

    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"exam_start","mode":"quick"}"#).unwrap();
    match handle_client_ws(msg, &state).await {
      ServerWsMessage::Exam { exam } => assert_eq!(exam.total, 10),
      other => panic!("unexpected reply {other:?}"),
    }

    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"tag_text","text":"covers K4"}"#).unwrap();
    match handle_client_ws(msg, &state).await {
      ServerWsMessage::Tags { requirements, .. } => assert_eq!(requirements, vec!["K4".to_string()]),
      other => panic!("unexpected reply {other:?}"),
    }
  }

  #[tokio::test]
  async fn watch_pushes_clock_then_finished_once() {
    let (_, state) = state_with(FakeProvider::default());
    let mut watch = ExamWatch::default();
    assert!(watch.on_tick(exam_snapshot(&state).await).is_none());

    start_exam(&state, ExamMode::Quick, None).await.unwrap();
    tick_exam(&state).await;
    match watch.on_tick(exam_snapshot(&state).await) {
      Some(ServerWsMessage::ExamClock { remaining_secs, total_secs, .. }) => {
        assert_eq!(total_secs, 900);
        assert_eq!(remaining_secs, 899);
      }
      other => panic!("expected clock, got {other:?}"),
    }

    while tick_exam(&state).await.is_none() {}
    assert!(matches!(watch.on_tick(exam_snapshot(&state).await), Some(ServerWsMessage::ExamFinished { .. })));
    assert!(watch.on_tick(exam_snapshot(&state).await).is_none());
  }

  #[tokio::test]
  async fn topic_exam_has_no_clock() {
    let (_, state) = state_with(FakeProvider::default());
    let mut watch = ExamWatch::default();
    start_exam(&state, ExamMode::Topic, Some("K3")).await.unwrap();
    assert!(watch.on_tick(exam_snapshot(&state).await).is_none());
  }
}
