//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "flow_trainer", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "flow_trainer", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "flow_trainer", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "flow_trainer", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "flow_trainer", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::ListExercises { user_id, difficulty, category } => {
      let user_id = state.user_or_default(user_id.as_deref());
      let exercises = list_exercises(state, &user_id, difficulty.as_deref(), category.as_deref()).await;
      ServerWsMessage::Exercises { exercises }
    }

    ClientWsMessage::GetExercise { exercise_id, user_id } => {
      let user_id = state.user_or_default(user_id.as_deref());
      match exercise_detail(state, &user_id, &exercise_id).await {
        Ok(detail) => ServerWsMessage::Exercise { detail },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::SubmitAttempt { exercise_id, attempt } => {
      let user_id = state.user_or_default(attempt.user_id.as_deref());
      match submit_speaking_attempt(state, &user_id, &exercise_id, attempt).await {
        Ok(result) => {
          info!(target: "speaking", id = %exercise_id, score = result.score, completed = result.completed, "WS attempt evaluated");
          ServerWsMessage::AttemptResult { result }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::Score { exercise, attempt } => {
      ServerWsMessage::ScoreResult { result: score_only(&exercise, &attempt) }
    }

    ClientWsMessage::Stats { user_id } => {
      let user_id = state.user_or_default(user_id.as_deref());
      ServerWsMessage::Stats { stats: user_stats(state, &user_id).await }
    }

    ClientWsMessage::Leaderboard => ServerWsMessage::Leaderboard { entries: leaderboard(state).await },

    ClientWsMessage::Evaluate(body) => match evaluate_response(state, body).await {
      Ok(result) => ServerWsMessage::Evaluation { result },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
  }
}
