//! Speaking-attempt scoring.
//!
//! A single pure pass over `(ExerciseConfig, AttemptInput)`:
//!   1. target-word coverage (case-insensitive substring match)
//!   2. grader sub-scores, each falling back to a fixed default
//!   3. weighted composite
//!   4. completion gate (score threshold AND minimum duration) and points
//!   5. fully populated feedback
//!
//! Rounding is round-half-up everywhere. The composite is accumulated in integer
//! percent weights so integer sub-scores never pick up float drift (77.5 -> 78).

use serde::{Deserialize, Deserializer, Serialize};

/// Weights in percent; they must sum to 100.
pub const TARGET_WORD_WEIGHT: u32 = 25;
pub const GRAMMAR_WEIGHT: u32 = 25;
pub const VOCABULARY_WEIGHT: u32 = 20;
pub const FLUENCY_WEIGHT: u32 = 15;
pub const RELEVANCE_WEIGHT: u32 = 15;

/// Sub-score used when the grader did not provide one.
pub const DEFAULT_SUB_SCORE: f64 = 70.0;
/// Target-word score when the exercise defines no target words.
pub const NEUTRAL_TARGET_WORD_SCORE: u32 = 50;
/// Minimum composite score for an attempt to count as completed.
pub const COMPLETION_THRESHOLD: u32 = 60;
/// Points = round(score * 8 / 10).
pub const POINTS_NUMERATOR: u32 = 8;
pub const POINTS_DENOMINATOR: u32 = 10;

pub const LOW_SCORE_SUGGESTIONS: [&str; 2] = ["Try to include more target words", "Speak clearly and naturally"];
pub const HIGH_SCORE_SUGGESTIONS: [&str; 1] = ["Great job!"];

/// The part of a speaking exercise that matters for scoring.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseConfig {
  #[serde(default)]
  pub target_words: Vec<String>,
  #[serde(default, alias = "minDuration")]
  pub min_duration_seconds: u32,
  /// Informational only; never enforced.
  #[serde(default, alias = "maxDuration")]
  pub max_duration_seconds: Option<u32>,
}

/// One submission.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptInput {
  #[serde(default)]
  pub transcription: String,
  #[serde(default, alias = "duration")]
  pub spoken_duration_seconds: u32,
  #[serde(default)]
  pub external_grade: Option<ExternalGrade>,
}

/// Rubric as returned by the LLM grader. Every field is independently optional;
/// a field of the wrong JSON type is treated as missing rather than failing the parse.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalGrade {
  #[serde(default, deserialize_with = "lenient_score", skip_serializing_if = "Option::is_none")]
  pub grammar_score: Option<f64>,
  #[serde(default, deserialize_with = "lenient_score", skip_serializing_if = "Option::is_none")]
  pub vocabulary_score: Option<f64>,
  #[serde(default, deserialize_with = "lenient_score", skip_serializing_if = "Option::is_none")]
  pub fluency_score: Option<f64>,
  #[serde(default, deserialize_with = "lenient_score", skip_serializing_if = "Option::is_none")]
  pub relevance_score: Option<f64>,
  #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
  pub suggestions: Option<Vec<String>>,
  #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
  pub strengths: Option<Vec<String>>,
  #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
  pub areas_for_improvement: Option<Vec<String>>,
}

pub(crate) fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
  let v = serde_json::Value::deserialize(d)?;
  Ok(v.as_f64())
}

pub(crate) fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
  let v = serde_json::Value::deserialize(d)?;
  Ok(match v {
    serde_json::Value::Array(items) => Some(
      items
        .into_iter()
        .filter_map(|i| match i {
          serde_json::Value::String(s) => Some(s),
          _ => None,
        })
        .collect(),
    ),
    _ => None,
  })
}

/// Grader output with every default already applied, so scoring never branches on presence.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGrade {
  pub grammar: f64,
  pub vocabulary: f64,
  pub fluency: f64,
  pub relevance: f64,
  pub suggestions: Option<Vec<String>>,
  pub strengths: Vec<String>,
  pub areas_for_improvement: Vec<String>,
}

impl ResolvedGrade {
  pub fn from_external(grade: Option<&ExternalGrade>) -> Self {
    let sub = |pick: fn(&ExternalGrade) -> Option<f64>| {
      grade
        .and_then(pick)
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 100.0))
        .unwrap_or(DEFAULT_SUB_SCORE)
    };
    Self {
      grammar: sub(|g| g.grammar_score),
      vocabulary: sub(|g| g.vocabulary_score),
      fluency: sub(|g| g.fluency_score),
      relevance: sub(|g| g.relevance_score),
      suggestions: grade.and_then(|g| g.suggestions.clone()),
      strengths: grade.and_then(|g| g.strengths.clone()).unwrap_or_default(),
      areas_for_improvement: grade.and_then(|g| g.areas_for_improvement.clone()).unwrap_or_default(),
    }
  }
}

/// Always fully populated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
  pub score: u32,
  pub target_words_used: usize,
  pub total_target_words: usize,
  pub target_word_score: u32,
  pub grammar_score: f64,
  pub vocabulary_score: f64,
  pub fluency_score: f64,
  pub relevance_score: f64,
  pub duration_met: bool,
  pub suggestions: Vec<String>,
  pub strengths: Vec<String>,
  pub areas_for_improvement: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
  pub final_score: u32,
  pub points_earned: u32,
  pub completed: bool,
  pub feedback: Feedback,
}

/// Target words found in the transcription, in exercise order.
pub fn target_words_used<'a>(target_words: &'a [String], transcription: &str) -> Vec<&'a str> {
  let lower = transcription.to_lowercase();
  target_words
    .iter()
    .filter(|w| lower.contains(&w.to_lowercase()))
    .map(|w| w.as_str())
    .collect()
}

/// round(100 * used / total), or the neutral score when there is nothing to cover.
pub fn target_word_score(used: usize, total: usize) -> u32 {
  if total == 0 {
    return NEUTRAL_TARGET_WORD_SCORE;
  }
  // (200u + t) / 2t == floor(100u/t + 1/2)
  ((200 * used + total) / (2 * total)) as u32
}

fn round_half_up(x: f64) -> u32 {
  (x + 0.5).floor().clamp(0.0, 100.0) as u32
}

pub fn composite_score(target_word_score: u32, grade: &ResolvedGrade) -> u32 {
  let weighted = f64::from(target_word_score) * f64::from(TARGET_WORD_WEIGHT)
    + grade.grammar * f64::from(GRAMMAR_WEIGHT)
    + grade.vocabulary * f64::from(VOCABULARY_WEIGHT)
    + grade.fluency * f64::from(FLUENCY_WEIGHT)
    + grade.relevance * f64::from(RELEVANCE_WEIGHT);
  round_half_up(weighted / 100.0)
}

pub fn points_for(final_score: u32) -> u32 {
  (final_score * POINTS_NUMERATOR * 2 + POINTS_DENOMINATOR) / (POINTS_DENOMINATOR * 2)
}

pub fn score(config: &ExerciseConfig, input: &AttemptInput) -> ScoringResult {
  let used = target_words_used(&config.target_words, &input.transcription).len();
  let total = config.target_words.len();
  let tw_score = target_word_score(used, total);

  let grade = ResolvedGrade::from_external(input.external_grade.as_ref());
  let final_score = composite_score(tw_score, &grade);

  let duration_met = input.spoken_duration_seconds >= config.min_duration_seconds;
  let completed = final_score >= COMPLETION_THRESHOLD && duration_met;
  let points_earned = if completed { points_for(final_score) } else { 0 };

  let suggestions = match grade.suggestions {
    Some(s) => s,
    None if final_score < COMPLETION_THRESHOLD => LOW_SCORE_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    None => HIGH_SCORE_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
  };

  ScoringResult {
    final_score,
    points_earned,
    completed,
    feedback: Feedback {
      score: final_score,
      target_words_used: used,
      total_target_words: total,
      target_word_score: tw_score,
      grammar_score: grade.grammar,
      vocabulary_score: grade.vocabulary,
      fluency_score: grade.fluency,
      relevance_score: grade.relevance,
      duration_met,
      suggestions,
      strengths: grade.strengths,
      areas_for_improvement: grade.areas_for_improvement,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cfg(words: &[&str], min: u32) -> ExerciseConfig {
    ExerciseConfig {
      target_words: words.iter().map(|w| w.to_string()).collect(),
      min_duration_seconds: min,
      max_duration_seconds: None,
    }
  }

  fn attempt(text: &str, secs: u32, grade: Option<ExternalGrade>) -> AttemptInput {
    AttemptInput { transcription: text.into(), spoken_duration_seconds: secs, external_grade: grade }
  }

  fn uniform_grade(s: f64) -> ExternalGrade {
    ExternalGrade {
      grammar_score: Some(s),
      vocabulary_score: Some(s),
      fluency_score: Some(s),
      relevance_score: Some(s),
      ..Default::default()
    }
  }

  #[test]
  fn weights_sum_to_one_hundred_percent() {
    assert_eq!(TARGET_WORD_WEIGHT + GRAMMAR_WEIGHT + VOCABULARY_WEIGHT + FLUENCY_WEIGHT + RELEVANCE_WEIGHT, 100);
  }

  #[test]
  fn hobby_scenario_rounds_half_up() {
    let r = score(
      &cfg(&["hobby", "enjoy"], 30),
      &attempt("My hobby is painting and I really enjoy it", 40, None),
    );
    assert_eq!(r.feedback.target_word_score, 100);
    assert_eq!(r.feedback.grammar_score, 70.0);
    assert_eq!(r.feedback.vocabulary_score, 70.0);
    assert_eq!(r.feedback.fluency_score, 70.0);
    assert_eq!(r.feedback.relevance_score, 70.0);
    assert_eq!(r.final_score, 78);
    assert!(r.completed);
    assert_eq!(r.points_earned, 62);
    assert_eq!(r.feedback.suggestions, vec!["Great job!".to_string()]);
    assert!(r.feedback.strengths.is_empty());
    assert!(r.feedback.areas_for_improvement.is_empty());
  }

  #[test]
  fn no_target_words_gives_neutral_score() {
    let r = score(&cfg(&[], 0), &attempt("anything at all", 5, None));
    assert_eq!(r.feedback.target_word_score, 50);
    assert_eq!(r.feedback.total_target_words, 0);
    // 50*.25 + 70*.75 = 65
    assert_eq!(r.final_score, 65);
  }

  #[test]
  fn matching_is_case_insensitive_and_substring_based() {
    let words = vec!["Social Media".to_string(), "privacy".to_string(), "balance".to_string()];
    let used = target_words_used(&words, "SOCIAL MEDIA changed how we value PRIVACY.");
    assert_eq!(used, vec!["Social Media", "privacy"]);
    // "enjoy" inside "enjoyed" still counts
    assert_eq!(target_words_used(&["enjoy".to_string()], "I enjoyed it").len(), 1);
  }

  #[test]
  fn target_word_score_rounds_half_up() {
    assert_eq!(target_word_score(1, 3), 33);
    assert_eq!(target_word_score(2, 3), 67);
    assert_eq!(target_word_score(1, 8), 13); // 12.5
    assert_eq!(target_word_score(0, 4), 0);
    assert_eq!(target_word_score(4, 4), 100);
  }

  #[test]
  fn long_score_with_short_duration_earns_nothing() {
    let r = score(
      &cfg(&["hobby"], 60),
      &attempt("hobby", 59, Some(uniform_grade(100.0))),
    );
    assert_eq!(r.final_score, 100);
    assert!(!r.feedback.duration_met);
    assert!(!r.completed);
    assert_eq!(r.points_earned, 0);
  }

  #[test]
  fn completion_threshold_boundary() {
    // target words absent: 50*.25 = 12.5; grade g on the rest: .75g
    // g = 63 -> 12.5 + 47.25 = 59.75 -> 60
    let at = score(&cfg(&[], 0), &attempt("", 0, Some(uniform_grade(63.0))));
    assert_eq!(at.final_score, 60);
    assert!(at.completed);
    assert_eq!(at.points_earned, 48);

    // g = 62 -> 12.5 + 46.5 = 59 -> 59
    let below = score(&cfg(&[], 0), &attempt("", 0, Some(uniform_grade(62.0))));
    assert_eq!(below.final_score, 59);
    assert!(!below.completed);
    assert_eq!(below.points_earned, 0);
  }

  #[test]
  fn low_score_without_grader_suggestions_uses_two_defaults() {
    let r = score(
      &cfg(&["alpha", "beta"], 0),
      &attempt("nothing relevant", 10, Some(uniform_grade(40.0))),
    );
    assert!(r.final_score < 60);
    assert_eq!(
      r.feedback.suggestions,
      vec!["Try to include more target words".to_string(), "Speak clearly and naturally".to_string()]
    );
  }

  #[test]
  fn empty_grader_suggestions_are_kept_even_below_threshold() {
    let grade = ExternalGrade { suggestions: Some(vec![]), ..uniform_grade(30.0) };
    let r = score(&cfg(&["alpha"], 0), &attempt("nothing", 10, Some(grade)));
    assert!(r.final_score < COMPLETION_THRESHOLD);
    assert!(r.feedback.suggestions.is_empty());
  }

  #[test]
  fn grader_lists_pass_through() {
    let grade = ExternalGrade {
      suggestions: Some(vec!["Use past tense".into()]),
      strengths: Some(vec!["Clear structure".into()]),
      areas_for_improvement: Some(vec!["Linking words".into()]),
      ..uniform_grade(90.0)
    };
    let r = score(&cfg(&["x"], 0), &attempt("x", 1, Some(grade)));
    assert_eq!(r.feedback.suggestions, vec!["Use past tense".to_string()]);
    assert_eq!(r.feedback.strengths, vec!["Clear structure".to_string()]);
    assert_eq!(r.feedback.areas_for_improvement, vec!["Linking words".to_string()]);
  }

  #[test]
  fn partial_grade_fills_missing_fields() {
    let grade = ExternalGrade { grammar_score: Some(90.0), ..Default::default() };
    let resolved = ResolvedGrade::from_external(Some(&grade));
    assert_eq!(resolved.grammar, 90.0);
    assert_eq!(resolved.vocabulary, 70.0);
    assert_eq!(resolved.fluency, 70.0);
    assert_eq!(resolved.relevance, 70.0);
    assert_eq!(resolved.suggestions, None);
  }

  #[test]
  fn zero_is_a_real_score_and_out_of_range_is_clamped() {
    let grade = ExternalGrade {
      grammar_score: Some(0.0),
      vocabulary_score: Some(150.0),
      fluency_score: Some(-3.0),
      relevance_score: Some(f64::NAN),
      ..Default::default()
    };
    let resolved = ResolvedGrade::from_external(Some(&grade));
    assert_eq!(resolved.grammar, 0.0);
    assert_eq!(resolved.vocabulary, 100.0);
    assert_eq!(resolved.fluency, 0.0);
    assert_eq!(resolved.relevance, 70.0);
  }

  #[test]
  fn lenient_grade_parsing_drops_wrong_types() {
    let raw = r#"{
      "grammarScore": 85,
      "vocabularyScore": "eighty",
      "fluencyScore": null,
      "overallScore": 80,
      "suggestions": ["one", 2, "three"],
      "strengths": "not a list"
    }"#;
    let g: ExternalGrade = serde_json::from_str(raw).expect("parse");
    assert_eq!(g.grammar_score, Some(85.0));
    assert_eq!(g.vocabulary_score, None);
    assert_eq!(g.fluency_score, None);
    assert_eq!(g.relevance_score, None);
    assert_eq!(g.suggestions, Some(vec!["one".to_string(), "three".to_string()]));
    assert_eq!(g.strengths, None);
    assert_eq!(g.areas_for_improvement, None);
  }

  #[test]
  fn scoring_is_deterministic() {
    let c = cfg(&["communication", "privacy"], 90);
    let a = attempt("Communication matters", 95, Some(uniform_grade(77.0)));
    assert_eq!(score(&c, &a), score(&c, &a));
  }

  #[test]
  fn final_score_stays_in_range_for_extremes() {
    for s in [0.0, 100.0] {
      let r = score(&cfg(&["a"], 0), &attempt(if s > 0.0 { "a" } else { "" }, 0, Some(uniform_grade(s))));
      assert!(r.final_score <= 100);
    }
    let top = score(&cfg(&["a"], 0), &attempt("a", 0, Some(uniform_grade(100.0))));
    assert_eq!(top.final_score, 100);
    assert_eq!(top.points_earned, 80);
    let bottom = score(&cfg(&["a"], 0), &attempt("", 0, Some(uniform_grade(0.0))));
    assert_eq!(bottom.final_score, 0);
  }

  #[test]
  fn points_round_half_up() {
    assert_eq!(points_for(78), 62); // 62.4
    assert_eq!(points_for(61), 49); // 48.8
    assert_eq!(points_for(65), 52);
    assert_eq!(points_for(100), 80);
  }

  #[test]
  fn exercise_config_accepts_web_field_names() {
    let c: ExerciseConfig =
      serde_json::from_str(r#"{"targetWords":["a"],"minDuration":30,"maxDuration":60}"#).expect("parse");
    assert_eq!(c.min_duration_seconds, 30);
    assert_eq!(c.max_duration_seconds, Some(60));
  }
}
