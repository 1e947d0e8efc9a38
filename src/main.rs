//! Flow Trainer · Speaking Practice Backend
//!
//! - Axum HTTP + WebSocket API
//! - Speaking-attempt scoring (target-word coverage + LLM rubric, weighted composite)
//! - Optional OpenAI grading and transcription (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                    : u16 (default 3000)
//!   OPENAI_API_KEY          : enables grading/transcription if present
//!   OPENAI_BASE_URL         : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL       : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL     : default "gpt-4o" (grading retry)
//!   OPENAI_TRANSCRIBE_MODEL : default "whisper-1"
//!   FLOW_CONFIG_PATH        : path to TOML config (prompts + optional exercise bank)
//!   DEFAULT_USER_ID         : user credited when a request names none (default "demo")
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod scoring;
mod evaluation;
mod domain;
mod config;
mod seeds;
mod state;
mod protocol;
mod logic;
mod openai;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (in-memory stores, OpenAI client, prompts).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "flow_trainer", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "flow_trainer", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "flow_trainer", error = %e, "Failed to listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "flow_trainer", "Shutdown signal received");
}
