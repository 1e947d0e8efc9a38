//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Listing speaking exercises for a user (level gate, filters, latest attempt)
//!   - Submitting a speaking attempt (transcribe -> grade -> score -> record -> credit)
//!   - Stateless scoring
//!   - Free-form response evaluation (grader, or local word overlap)
//!   - User stats and the leaderboard

use base64::Engine;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::SpeakingAttempt;
use crate::error::AppError;
use crate::evaluation::{local_evaluation, ResponseEvaluation};
use crate::protocol::*;
use crate::scoring::{self, AttemptInput, ExerciseConfig, ScoringResult};
use crate::state::AppState;
use crate::util::now_millis;

const LEADERBOARD_SIZE: usize = 10;

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn list_exercises(
  state: &AppState,
  user_id: &str,
  difficulty: Option<&str>,
  category: Option<&str>,
) -> Vec<ExerciseListItem> {
  let level = state.progress_for(user_id).await.level;

  let mut visible: Vec<_> = state
    .exercises
    .read()
    .await
    .values()
    .filter(|e| e.is_active && e.required_level <= level)
    .filter(|e| difficulty.map_or(true, |d| e.difficulty.eq_ignore_ascii_case(d)))
    .filter(|e| category.map_or(true, |c| e.category.eq_ignore_ascii_case(c)))
    .cloned()
    .collect();
  visible.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.title.cmp(&b.title)));

  let attempts = state.attempts.read().await;
  visible
    .into_iter()
    .map(|exercise| {
      let mine = attempts.iter().filter(|a| a.exercise_id == exercise.id && a.user_id == user_id);
      let latest_attempt = mine.max_by_key(|a| a.completed_at).cloned();
      let attempt_count = attempts.iter().filter(|a| a.exercise_id == exercise.id).count();
      ExerciseListItem { exercise, latest_attempt, attempt_count }
    })
    .collect()
}

#[instrument(level = "info", skip(state), fields(%user_id, %exercise_id))]
pub async fn exercise_detail(state: &AppState, user_id: &str, exercise_id: &str) -> Result<ExerciseDetailOut, AppError> {
  let exercise = state
    .get_exercise(exercise_id)
    .await
    .ok_or_else(|| AppError::not_found(format!("Exercise not found: {}", exercise_id)))?;
  let attempts = state.attempts_for(user_id, exercise_id).await;
  Ok(ExerciseDetailOut { exercise, attempts })
}

/// Accepts either raw base64 or a `data:<mime>;base64,` URL.
fn decode_audio(b64: &str) -> Result<Vec<u8>, AppError> {
  let payload = match b64.split_once(";base64,") {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => b64,
  };
  base64::engine::general_purpose::STANDARD
    .decode(payload.trim())
    .map_err(|e| AppError::bad_request(format!("Invalid audioBase64: {}", e)))
}

fn audio_extension(mime: &str) -> &str {
  mime
    .split(';')
    .next()
    .and_then(|m| m.split('/').nth(1))
    .filter(|ext| !ext.is_empty())
    .unwrap_or("webm")
}

#[instrument(level = "info", skip(state, body), fields(%user_id, %exercise_id, duration = body.duration, auto = body.auto_transcribe))]
pub async fn submit_speaking_attempt(
  state: &AppState,
  user_id: &str,
  exercise_id: &str,
  body: AttemptIn,
) -> Result<AttemptOut, AppError> {
  let exercise = state
    .get_exercise(exercise_id)
    .await
    .filter(|e| e.is_active)
    .ok_or_else(|| AppError::not_found(format!("Exercise not found: {}", exercise_id)))?;

  let mut transcription = body.transcription.as_deref().unwrap_or("").trim().to_string();
  if transcription.is_empty() && body.auto_transcribe {
    if let Some(b64) = body.audio_base64.as_deref().filter(|s| !s.is_empty()) {
      let audio = decode_audio(b64)?;
      let mime = body.mime.as_deref().unwrap_or("audio/webm");
      let file_name = format!("{}-{}.{}", now_millis(), user_id, audio_extension(mime));
      match &state.openai {
        Some(oa) => match oa.transcribe(audio, mime, &file_name).await {
          Ok(t) => transcription = t,
          Err(e) => error!(target: "speaking", id = %exercise.id, error = %e, "Auto-transcription failed; scoring empty transcription."),
        },
        None => warn!(target: "speaking", id = %exercise.id, "Auto-transcription requested but OpenAI is disabled."),
      }
    }
  }

  let config = exercise.scoring_config();
  let external_grade = match &state.openai {
    Some(oa) => {
      let used = scoring::target_words_used(&config.target_words, &transcription);
      match oa.grade_speaking(&state.prompts, &exercise, &transcription, &used, body.duration).await {
        Ok(g) => Some(g),
        Err(e) => {
          error!(target: "speaking", id = %exercise.id, error = %e, "OpenAI grading failed; using default sub-scores.");
          None
        }
      }
    }
    None => None,
  };

  let input = AttemptInput {
    transcription: transcription.clone(),
    spoken_duration_seconds: body.duration,
    external_grade,
  };
  let result = scoring::score(&config, &input);

  let attempt = SpeakingAttempt {
    id: Uuid::new_v4().to_string(),
    user_id: user_id.to_string(),
    exercise_id: exercise.id.clone(),
    transcription: transcription.clone(),
    duration: body.duration,
    feedback: result.feedback.clone(),
    score: result.final_score,
    points_earned: result.points_earned,
    completed: result.completed,
    completed_at: now_millis(),
  };
  let progress = state.record_attempt(attempt.clone()).await;

  info!(
    target: "speaking",
    id = %exercise.id,
    %user_id,
    score = result.final_score,
    completed = result.completed,
    points = result.points_earned,
    graded = input.external_grade.is_some(),
    total_points = progress.total_points,
    level = progress.level,
    "Speaking attempt scored"
  );

  Ok(AttemptOut {
    attempt,
    score: result.final_score,
    completed: result.completed,
    points_earned: result.points_earned,
    feedback: result.feedback,
    transcription,
    progress,
  })
}

/// Scoring without grader, transcription or persistence.
#[instrument(level = "info", skip_all, fields(targets = config.target_words.len(), graded = input.external_grade.is_some()))]
pub fn score_only(config: &ExerciseConfig, input: &AttemptInput) -> ScoringResult {
  let r = scoring::score(config, input);
  info!(target: "speaking", score = r.final_score, completed = r.completed, "Stateless score computed");
  r
}

#[instrument(level = "info", skip_all, fields(exercise_type = ?body.exercise_type))]
pub async fn evaluate_response(state: &AppState, body: EvaluateIn) -> Result<EvaluateOut, AppError> {
  let user_response = body.user_response.as_deref().unwrap_or("").trim();
  let correct_answer = body.correct_answer.as_deref().unwrap_or("").trim();
  if user_response.is_empty() || correct_answer.is_empty() {
    return Err(AppError::bad_request("userResponse and correctAnswer are required"));
  }

  let graded: Option<ResponseEvaluation> = match &state.openai {
    Some(oa) => match oa
      .evaluate_response(&state.prompts, user_response, correct_answer, body.exercise_type.as_deref(), body.context.as_deref())
      .await
    {
      Ok(e) => Some(e),
      Err(e) => {
        error!(target: "speaking", error = %e, "OpenAI evaluation failed; using local word overlap.");
        None
      }
    },
    None => None,
  };
  let local = graded.is_none();
  let evaluation = graded.unwrap_or_else(|| local_evaluation(user_response, correct_answer));

  info!(target: "speaking", score = evaluation.score, correct = evaluation.is_correct, local, "Response evaluated");
  Ok(EvaluateOut { success: true, evaluation })
}

/// round-half-up of 100 * part / whole; 0 when whole is 0.
fn percent(part: usize, whole: usize) -> u32 {
  if whole == 0 { 0 } else { ((200 * part + whole) / (2 * whole)) as u32 }
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn user_stats(state: &AppState, user_id: &str) -> StatsOut {
  let user = state.progress_for(user_id).await;

  let (total_attempts, completed_attempts) = {
    let attempts = state.attempts.read().await;
    let mine: Vec<_> = attempts.iter().filter(|a| a.user_id == user_id).collect();
    (mine.len(), mine.iter().filter(|a| a.completed).count())
  };

  let ahead = state
    .users
    .read()
    .await
    .values()
    .filter(|u| u.total_points > user.total_points)
    .count();

  StatsOut {
    accuracy: percent(completed_attempts, total_attempts),
    user,
    total_attempts,
    completed_attempts,
    leaderboard_position: ahead + 1,
  }
}

#[instrument(level = "info", skip(state))]
pub async fn leaderboard(state: &AppState) -> Vec<LeaderboardEntry> {
  let mut users: Vec<_> = state.users.read().await.values().cloned().collect();
  users.sort_by(|a, b| b.total_points.cmp(&a.total_points).then_with(|| a.user_id.cmp(&b.user_id)));
  users
    .into_iter()
    .take(LEADERBOARD_SIZE)
    .enumerate()
    .map(|(i, u)| LeaderboardEntry {
      rank: i + 1,
      name: u.name.unwrap_or_else(|| "Anonymous".into()),
      points: u.total_points,
      level: u.level,
    })
    .collect()
}
