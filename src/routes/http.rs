//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, Path, Query, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic::*;
use crate::protocol::*;
use crate::scoring::ScoringResult;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, grader: state.openai.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_exercises(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ExercisesQuery>,
) -> impl IntoResponse {
  let user_id = state.user_or_default(q.user_id.as_deref());
  let exercises = list_exercises(&state, &user_id, q.difficulty.as_deref(), q.category.as_deref()).await;
  info!(target: "speaking", %user_id, count = exercises.len(), "HTTP exercises served");
  Json(ExercisesOut { exercises })
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_exercise(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<UserQuery>,
) -> Result<Json<ExerciseDetailOut>, AppError> {
  let user_id = state.user_or_default(q.user_id.as_deref());
  Ok(Json(exercise_detail(&state, &user_id, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%id))]
pub async fn http_post_attempt(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Result<Json<AttemptIn>, JsonRejection>,
) -> Result<Json<AttemptOut>, AppError> {
  let Json(body) = body?;
  let user_id = state.user_or_default(body.user_id.as_deref());
  let out = submit_speaking_attempt(&state, &user_id, &id, body).await?;
  info!(target: "speaking", %id, %user_id, score = out.score, completed = out.completed, "HTTP attempt evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(body))]
pub async fn http_post_score(body: Result<Json<ScoreIn>, JsonRejection>) -> Result<Json<ScoringResult>, AppError> {
  let Json(body) = body?;
  Ok(Json(score_only(&body.exercise, &body.attempt)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_evaluate(
  State(state): State<Arc<AppState>>,
  body: Result<Json<EvaluateIn>, JsonRejection>,
) -> Result<Json<EvaluateOut>, AppError> {
  let Json(body) = body?;
  Ok(Json(evaluate_response(&state, body).await?))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_stats(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  Json(user_stats(&state, &id).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_leaderboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(leaderboard(&state).await)
}
