//! Domain models: speaking exercises, recorded attempts, and per-user progress.

use serde::{Deserialize, Serialize};

use crate::scoring::{ExerciseConfig, Feedback};

/// Points needed per level; a fresh user starts at level 1.
pub const POINTS_PER_LEVEL: u32 = 100;

/// Where did the exercise come from?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseSource {
  LocalBank, // from the TOML config
  Seed,      // built-in
}

/// A speaking prompt the learner answers out loud.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingExercise {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  pub difficulty: String, // free-form ("Beginner", "Intermediate", ...)
  pub category: String,
  pub prompt: String,
  #[serde(default)] pub context: Option<String>,
  #[serde(default)] pub target_words: Vec<String>,
  #[serde(default)] pub min_duration: u32,
  #[serde(default)] pub max_duration: Option<u32>,
  pub is_active: bool,
  pub required_level: u32,
  pub order: u32,
  #[serde(default)] pub tags: Vec<String>,
  pub source: ExerciseSource,
}

impl SpeakingExercise {
  pub fn scoring_config(&self) -> ExerciseConfig {
    ExerciseConfig {
      target_words: self.target_words.clone(),
      min_duration_seconds: self.min_duration,
      max_duration_seconds: self.max_duration,
    }
  }
}

/// One recorded submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingAttempt {
  pub id: String,
  pub user_id: String,
  pub exercise_id: String,
  pub transcription: String,
  pub duration: u32,
  pub feedback: Feedback,
  pub score: u32,
  pub points_earned: u32,
  pub completed: bool,
  /// Unix epoch milliseconds.
  pub completed_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
  pub user_id: String,
  #[serde(default)] pub name: Option<String>,
  pub total_points: u32,
  pub level: u32,
}

impl UserProgress {
  pub fn new(user_id: &str) -> Self {
    Self { user_id: user_id.to_string(), name: None, total_points: 0, level: 1 }
  }

  /// Add points and recompute the level from the running total.
  pub fn credit(&mut self, points: u32) {
    self.total_points = self.total_points.saturating_add(points);
    self.level = 1 + self.total_points / POINTS_PER_LEVEL;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_follows_total_points() {
    let mut p = UserProgress::new("u1");
    assert_eq!(p.level, 1);
    p.credit(62);
    assert_eq!((p.total_points, p.level), (62, 1));
    p.credit(62);
    assert_eq!((p.total_points, p.level), (124, 2));
    p.credit(0);
    assert_eq!(p.level, 2);
  }
}
