//! Minimal OpenAI-compatible client for speaking grading and audio transcription.
//!
//! Grading and free-form evaluation call chat.completions asking for a JSON object; transcription posts
//! multipart audio to /audio/transcriptions.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key or the learner's transcription.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{instrument, info, warn};

use crate::config::Prompts;
use crate::domain::SpeakingExercise;
use crate::error::GraderError;
use crate::evaluation::{RawEvaluation, ResponseEvaluation};
use crate::scoring::ExternalGrade;
use crate::util::{extract_json_object, fill_template, trunc_for_log};

const CLIENT_UA: &str = "flow-trainer-backend/0.1";
/// Shown to the grader when the exercise leaves the range open.
const FALLBACK_MIN_DURATION: u32 = 30;
const FALLBACK_MAX_DURATION: u32 = 120;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub transcribe_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let transcribe_model =
      std::env::var("OPENAI_TRANSCRIBE_MODEL").unwrap_or_else(|_| "whisper-1".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model, transcribe_model })
  }

  /// Chat completion in JSON-object mode; returns the raw message text.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json_text(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, GraderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(2000),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(GraderError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default())
  }

  /// Grade a speaking attempt. Tries the fast model first; if its reply is not a
  /// usable JSON object, retries once with the strong model.
  #[instrument(
    level = "info",
    skip(self, prompts, exercise, transcription, words_used),
    fields(exercise_id = %exercise.id, transcription_len = transcription.len(), used = words_used.len(), %duration)
  )]
  pub async fn grade_speaking(
    &self,
    prompts: &Prompts,
    exercise: &SpeakingExercise,
    transcription: &str,
    words_used: &[&str],
    duration: u32,
  ) -> Result<ExternalGrade, GraderError> {
    let user = build_grading_prompt(prompts, exercise, transcription, words_used, duration);

    let start = Instant::now();
    let first = self.chat_json_text(&self.fast_model, &prompts.grading_system, &user, 0.3).await?;
    match parse_grade_reply(&first) {
      Ok(g) => {
        info!(elapsed = ?start.elapsed(), model = %self.fast_model, "Speaking grade received");
        return Ok(g);
      }
      Err(e) => {
        warn!(error = %e, reply = %trunc_for_log(&first, 200), "Unusable grading reply; retrying with strong model");
      }
    }

    let second = self.chat_json_text(&self.strong_model, &prompts.grading_system, &user, 0.0).await?;
    let grade = parse_grade_reply(&second)?;
    info!(elapsed = ?start.elapsed(), model = %self.strong_model, "Speaking grade received (retry)");
    Ok(grade)
  }

  /// Evaluate a spoken answer against the expected one. Single fast-model call.
  #[instrument(
    level = "info",
    skip(self, prompts, user_response, correct_answer, context),
    fields(response_len = user_response.len(), exercise_type = exercise_type.unwrap_or("-"))
  )]
  pub async fn evaluate_response(
    &self,
    prompts: &Prompts,
    user_response: &str,
    correct_answer: &str,
    exercise_type: Option<&str>,
    context: Option<&str>,
  ) -> Result<ResponseEvaluation, GraderError> {
    let user = build_evaluation_prompt(prompts, user_response, correct_answer, exercise_type, context);
    let start = Instant::now();
    let reply = self.chat_json_text(&self.fast_model, &prompts.evaluate_system, &user, 0.7).await?;
    let evaluation = parse_evaluation_reply(&reply)?;
    info!(elapsed = ?start.elapsed(), model = %self.fast_model, score = evaluation.score, "Response evaluation received");
    Ok(evaluation)
  }

  /// Transcribe English speech.
  #[instrument(level = "info", skip(self, audio), fields(audio_len = audio.len(), %mime, model = %self.transcribe_model))]
  pub async fn transcribe(&self, audio: Vec<u8>, mime: &str, file_name: &str) -> Result<String, GraderError> {
    let url = format!("{}/audio/transcriptions", self.base_url);
    let part = reqwest::multipart::Part::bytes(audio)
      .file_name(file_name.to_string())
      .mime_str(mime)?;
    let form = reqwest::multipart::Form::new()
      .text("model", self.transcribe_model.clone())
      .text("language", "en")
      .part("file", part);

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .multipart(form)
      .send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(GraderError::Http { status, message });
    }

    #[derive(Deserialize)]
    struct Transcription { #[serde(default)] text: String }

    let t: Transcription = res.json().await?;
    info!(elapsed = ?start.elapsed(), text_len = t.text.len(), "Transcription received");
    Ok(t.text.trim().to_string())
  }
}

/// Render the grading prompt for one attempt.
pub fn build_grading_prompt(
  prompts: &Prompts,
  exercise: &SpeakingExercise,
  transcription: &str,
  words_used: &[&str],
  duration: u32,
) -> String {
  let context = exercise.context.as_deref().filter(|c| !c.trim().is_empty()).unwrap_or("None");
  let min = if exercise.min_duration == 0 { FALLBACK_MIN_DURATION } else { exercise.min_duration };
  let max = exercise.max_duration.filter(|m| *m > 0).unwrap_or(FALLBACK_MAX_DURATION);
  let (duration, min, max) = (duration.to_string(), min.to_string(), max.to_string());
  let target_words = exercise.target_words.join(", ");
  let used = words_used.join(", ");

  fill_template(
    &prompts.grading_user_template,
    &[
      ("prompt", exercise.prompt.as_str()),
      ("context", context),
      ("target_words", target_words.as_str()),
      ("words_used", used.as_str()),
      ("transcription", transcription),
      ("duration", duration.as_str()),
      ("min_duration", min.as_str()),
      ("max_duration", max.as_str()),
    ],
  )
}

/// Pull the grading object out of a model reply.
pub fn parse_grade_reply(text: &str) -> Result<ExternalGrade, GraderError> {
  let obj = extract_json_object(text).ok_or(GraderError::NoJson)?;
  Ok(serde_json::from_str::<ExternalGrade>(obj)?)
}

pub fn build_evaluation_prompt(
  prompts: &Prompts,
  user_response: &str,
  correct_answer: &str,
  exercise_type: Option<&str>,
  context: Option<&str>,
) -> String {
  let context = context.filter(|c| !c.trim().is_empty()).unwrap_or("General speaking practice");
  let exercise_type = exercise_type.filter(|t| !t.trim().is_empty()).unwrap_or("pronunciation");
  fill_template(
    &prompts.evaluate_user_template,
    &[
      ("context", context),
      ("exercise_type", exercise_type),
      ("correct_answer", correct_answer),
      ("user_response", user_response),
    ],
  )
}

pub fn parse_evaluation_reply(text: &str) -> Result<ResponseEvaluation, GraderError> {
  let obj = extract_json_object(text).ok_or(GraderError::NoJson)?;
  Ok(serde_json::from_str::<RawEvaluation>(obj)?.into())
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
