//! Loading trainer configuration (grading prompts + optional exercise bank) from TOML.
//!
//! See `TrainerConfig` and `Prompts` for expected schema.

use serde::Deserialize;
use tracing::{info, error};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TrainerConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub exercises: Vec<ExerciseCfg>,
}

/// Exercise entry accepted in TOML configuration. Entries reusing a seed id replace the seed.
#[derive(Clone, Debug, Deserialize)]
pub struct ExerciseCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  pub difficulty: String,
  #[serde(default)] pub category: Option<String>,
  pub prompt: String,
  #[serde(default)] pub context: Option<String>,
  #[serde(default)] pub target_words: Vec<String>,
  #[serde(default)] pub min_duration: Option<u32>,
  #[serde(default)] pub max_duration: Option<u32>,
  #[serde(default)] pub is_active: Option<bool>,
  #[serde(default)] pub required_level: Option<u32>,
  #[serde(default)] pub order: Option<u32>,
  #[serde(default)] pub tags: Vec<String>,
}

/// Prompts used by the grading client.
/// Grading placeholders: {prompt} {context} {target_words} {words_used} {transcription}
/// {duration} {min_duration} {max_duration}
/// Evaluation placeholders: {context} {exercise_type} {correct_answer} {user_response}
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub grading_system: String,
  pub grading_user_template: String,
  pub evaluate_system: String,
  pub evaluate_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grading_system: "You are an English language teacher evaluating a student's speaking exercise. Respond ONLY with strict JSON.".into(),
      grading_user_template: "Exercise Prompt: {prompt}\n\
Context: {context}\n\
Target Words Expected: {target_words}\n\
Target Words Used: {words_used}\n\
Student Transcription: {transcription}\n\
Speaking Duration: {duration} seconds\n\
Required Duration: {min_duration} - {max_duration} seconds\n\
\n\
Evaluate the student's response and provide:\n\
1. Grammar quality score (0-100)\n\
2. Vocabulary quality score (0-100)\n\
3. Fluency score based on natural expression (0-100)\n\
4. Relevance score to the prompt (0-100)\n\
5. 3-5 specific, actionable suggestions for improvement\n\
\n\
Return a JSON object: {\"grammarScore\": number, \"vocabularyScore\": number, \"fluencyScore\": number, \"relevanceScore\": number, \"overallScore\": number, \"suggestions\": [string], \"strengths\": [string], \"areasForImprovement\": [string]}".into(),
      evaluate_system: "You are an experienced American English teacher and pronunciation specialist. Evaluate the student's spoken answer (given as a transcription) for grammar, vocabulary, fluency, likely pronunciation issues and natural usage. Be encouraging but honest. Respond ONLY with strict JSON.".into(),
      evaluate_user_template: "Exercise context: {context}\n\
Exercise type: {exercise_type}\n\
\n\
Expected answer: \"{correct_answer}\"\n\
Student answer: \"{user_response}\"\n\
\n\
Provide an overall score (0-100), a short analysis, strengths, areas to improve, specific suggestions, likely pronunciation errors and vocabulary or phrasing alternatives.\n\
\n\
Return a JSON object: {\"score\": number, \"isCorrect\": boolean, \"analysis\": string, \"strengths\": [string], \"improvements\": [string], \"suggestions\": [string], \"pronunciationErrors\": [string], \"vocabularyAlternatives\": [string]}".into(),
    }
  }
}

/// Attempt to load `TrainerConfig` from FLOW_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_trainer_config_from_env() -> Option<TrainerConfig> {
  let path = std::env::var("FLOW_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_trainer_config(&s) {
      Ok(cfg) => {
        info!(target: "flow_trainer", %path, exercises = cfg.exercises.len(), "Loaded trainer config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "flow_trainer", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "flow_trainer", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_trainer_config(s: &str) -> Result<TrainerConfig, toml::de::Error> {
  toml::from_str::<TrainerConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_prompts_keep_defaults() {
    let cfg = parse_trainer_config(
      r#"
[prompts]
grading_system = "Be brief."

[[exercises]]
title = "Order Coffee"
difficulty = "Beginner"
prompt = "Order a drink at a cafe."
target_words = ["please", "latte"]
min_duration = 20
"#,
    )
    .expect("valid toml");
    assert_eq!(cfg.prompts.grading_system, "Be brief.");
    assert!(cfg.prompts.grading_user_template.contains("{transcription}"));
    assert!(cfg.prompts.evaluate_user_template.contains("{user_response}"));
    assert_eq!(cfg.exercises.len(), 1);
    assert_eq!(cfg.exercises[0].target_words, vec!["please".to_string(), "latte".to_string()]);
    assert_eq!(cfg.exercises[0].min_duration, Some(20));
    assert_eq!(cfg.exercises[0].id, None);
  }

  #[test]
  fn empty_file_is_valid() {
    let cfg = parse_trainer_config("").expect("empty toml");
    assert!(cfg.exercises.is_empty());
  }
}
