//! Free-form evaluation of a spoken response against an expected answer.
//!
//! The grader reply is parsed leniently and normalized into `ResponseEvaluation`.
//! Without a grader (or when it fails) a local word-overlap check stands in.

use serde::{Deserialize, Serialize};

use crate::scoring::{lenient_list, lenient_score, COMPLETION_THRESHOLD};

/// Marker appended to analyses produced without the grader.
pub const LOCAL_MARKER: &str = "(local)";

/// Always fully populated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvaluation {
  pub score: u32,
  pub is_correct: bool,
  pub analysis: String,
  pub strengths: Vec<String>,
  pub improvements: Vec<String>,
  pub suggestions: Vec<String>,
  pub pronunciation_errors: Vec<String>,
  pub vocabulary_alternatives: Vec<String>,
}

/// Grader reply as received; any field may be missing or mistyped.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvaluation {
  #[serde(default, deserialize_with = "lenient_score")]
  pub score: Option<f64>,
  #[serde(default)]
  pub is_correct: Option<serde_json::Value>,
  #[serde(default)]
  pub analysis: Option<serde_json::Value>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub strengths: Option<Vec<String>>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub improvements: Option<Vec<String>>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub suggestions: Option<Vec<String>>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub pronunciation_errors: Option<Vec<String>>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub vocabulary_alternatives: Option<Vec<String>>,
}

impl From<RawEvaluation> for ResponseEvaluation {
  fn from(raw: RawEvaluation) -> Self {
    let score = raw
      .score
      .filter(|s| s.is_finite())
      .map(|s| (s.clamp(0.0, 100.0) + 0.5).floor() as u32)
      .unwrap_or(0);
    let is_correct = raw
      .is_correct
      .and_then(|v| v.as_bool())
      .unwrap_or(score >= COMPLETION_THRESHOLD);
    let analysis = match raw.analysis {
      Some(serde_json::Value::String(s)) => s,
      _ => String::new(),
    };
    Self {
      score,
      is_correct,
      analysis,
      strengths: raw.strengths.unwrap_or_default(),
      improvements: raw.improvements.unwrap_or_default(),
      suggestions: raw.suggestions.unwrap_or_default(),
      pronunciation_errors: raw.pronunciation_errors.unwrap_or_default(),
      vocabulary_alternatives: raw.vocabulary_alternatives.unwrap_or_default(),
    }
  }
}

fn words(text: &str) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for w in text
    .split(|c: char| !c.is_alphanumeric() && c != '\'')
    .map(|w| w.trim_matches('\'').to_lowercase())
    .filter(|w| !w.is_empty())
  {
    if !out.contains(&w) {
      out.push(w);
    }
  }
  out
}

/// Share of the expected answer's distinct words that the response contains.
pub fn local_evaluation(user_response: &str, correct_answer: &str) -> ResponseEvaluation {
  let expected = words(correct_answer);
  let said = words(user_response);
  let (hit, missing): (Vec<_>, Vec<_>) = expected.iter().partition(|w| said.contains(w));

  let score = if expected.is_empty() {
    0
  } else {
    ((200 * hit.len() + expected.len()) / (2 * expected.len())) as u32
  };

  let mut strengths = Vec::new();
  if !hit.is_empty() {
    strengths.push(format!("Used {} of {} expected words", hit.len(), expected.len()));
  }
  let mut improvements = Vec::new();
  let mut suggestions = Vec::new();
  if !missing.is_empty() {
    let list = missing.iter().map(|w| w.as_str()).collect::<Vec<_>>().join(", ");
    improvements.push(format!("Missing words: {}", list));
    suggestions.push(format!("Practice saying the full sentence, including: {}", list));
  }

  ResponseEvaluation {
    score,
    is_correct: score >= COMPLETION_THRESHOLD,
    analysis: format!("Matched {} of {} expected words {}", hit.len(), expected.len(), LOCAL_MARKER),
    strengths,
    improvements,
    suggestions,
    pronunciation_errors: Vec::new(),
    vocabulary_alternatives: Vec::new(),
  }
}
