//! Application state: in-memory stores, prompts, and the optional grading client.
//!
//! This module owns:
//!   - the speaking exercise catalog (seeds + TOML bank)
//!   - recorded attempts
//!   - per-user progress (points, level)
//!   - the prompts struct (from TOML or defaults)
//!   - optional OpenAI client
//!
//! Persistence is out of scope; everything here lives for the process lifetime.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_trainer_config_from_env, ExerciseCfg, Prompts, TrainerConfig};
use crate::domain::{ExerciseSource, SpeakingAttempt, SpeakingExercise, UserProgress};
use crate::openai::OpenAI;
use crate::seeds::seed_exercises;

pub const DEFAULT_USER_ID: &str = "demo";

#[derive(Clone)]
pub struct AppState {
    pub exercises: Arc<RwLock<HashMap<String, SpeakingExercise>>>,
    pub attempts: Arc<RwLock<Vec<SpeakingAttempt>>>,
    pub users: Arc<RwLock<HashMap<String, UserProgress>>>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
    pub default_user_id: String,
}

impl AppState {
    /// Build state from env: load config, seed exercises, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_trainer_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "flow_trainer", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, transcribe_model = %oa.transcribe_model, "OpenAI enabled.");
        } else {
            info!(target: "flow_trainer", "OpenAI disabled (no OPENAI_API_KEY). Attempts are scored with default sub-scores.");
        }

        let default_user_id = std::env::var("DEFAULT_USER_ID")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        Self::from_parts(cfg, openai, default_user_id)
    }

    /// Build state from already-loaded pieces. Config exercises override seeds with the same id.
    pub fn from_parts(cfg: TrainerConfig, openai: Option<OpenAI>, default_user_id: String) -> Self {
        let mut catalog = HashMap::<String, SpeakingExercise>::new();
        for ex in seed_exercises() {
            catalog.insert(ex.id.clone(), ex);
        }

        for ec in &cfg.exercises {
            let ex = exercise_from_cfg(ec);
            if catalog.contains_key(&ex.id) {
                warn!(target: "speaking", id = %ex.id, "Config exercise replaces built-in seed");
            }
            catalog.insert(ex.id.clone(), ex);
        }

        let mut count_by_diff: HashMap<String, (usize, usize)> = HashMap::new();
        for ex in catalog.values() {
            let entry = count_by_diff.entry(ex.difficulty.clone()).or_insert((0, 0));
            match ex.source {
                ExerciseSource::LocalBank => entry.0 += 1,
                ExerciseSource::Seed => entry.1 += 1,
            }
        }
        for (diff, (bank, seed)) in count_by_diff {
            info!(target: "speaking", %diff, local_bank = bank, seed = seed, "Startup exercise inventory");
        }

        let mut users = HashMap::new();
        users.insert(default_user_id.clone(), UserProgress::new(&default_user_id));

        Self {
            exercises: Arc::new(RwLock::new(catalog)),
            attempts: Arc::new(RwLock::new(Vec::new())),
            users: Arc::new(RwLock::new(users)),
            openai,
            prompts: cfg.prompts,
            default_user_id,
        }
    }

    /// Resolve an optional caller-supplied user id.
    pub fn user_or_default(&self, user_id: Option<&str>) -> String {
        user_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_user_id.clone())
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_exercise(&self, id: &str) -> Option<SpeakingExercise> {
        self.exercises.read().await.get(id).cloned()
    }

    /// Snapshot of a user's progress. Unknown users read as a fresh level-1 record
    /// without being stored; only `record_attempt` inserts.
    #[instrument(level = "debug", skip(self), fields(%user_id))]
    pub async fn progress_for(&self, user_id: &str) -> UserProgress {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserProgress::new(user_id))
    }

    /// Store the attempt and, when it earned points, credit the user. Returns updated progress.
    #[instrument(level = "debug", skip(self, attempt), fields(id = %attempt.id, user_id = %attempt.user_id))]
    pub async fn record_attempt(&self, attempt: SpeakingAttempt) -> UserProgress {
        let progress = {
            let mut users = self.users.write().await;
            let p = users
                .entry(attempt.user_id.clone())
                .or_insert_with(|| UserProgress::new(&attempt.user_id));
            if attempt.completed {
                p.credit(attempt.points_earned);
            }
            p.clone()
        };
        self.attempts.write().await.push(attempt);
        progress
    }

    /// A user's attempts on one exercise, newest first.
    pub async fn attempts_for(&self, user_id: &str, exercise_id: &str) -> Vec<SpeakingAttempt> {
        let mut out: Vec<SpeakingAttempt> = self
            .attempts
            .read()
            .await
            .iter()
            .filter(|a| a.user_id == user_id && a.exercise_id == exercise_id)
            .cloned()
            .collect();
        // reversed first so that, for equal timestamps, later inserts come first
        out.reverse();
        out.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        out
    }
}

fn exercise_from_cfg(ec: &ExerciseCfg) -> SpeakingExercise {
    SpeakingExercise {
        id: ec.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: ec.title.clone(),
        description: ec.description.clone().unwrap_or_default(),
        difficulty: ec.difficulty.clone(),
        category: ec.category.clone().unwrap_or_else(|| "conversation".into()),
        prompt: ec.prompt.clone(),
        context: ec.context.clone(),
        target_words: ec.target_words.clone(),
        min_duration: ec.min_duration.unwrap_or(0),
        max_duration: ec.max_duration,
        is_active: ec.is_active.unwrap_or(true),
        required_level: ec.required_level.unwrap_or(1),
        order: ec.order.unwrap_or(u32::MAX),
        tags: ec.tags.clone(),
        source: ExerciseSource::LocalBank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_trainer_config;

    #[tokio::test]
    async fn config_bank_overrides_and_extends_seeds() {
        let cfg = parse_trainer_config(
            r#"
[[exercises]]
id = "introduce-yourself"
title = "Introduce Yourself (short)"
difficulty = "Beginner"
prompt = "Say your name."
min_duration = 5

[[exercises]]
id = "order-coffee"
title = "Order Coffee"
difficulty = "Beginner"
prompt = "Order a drink."
"#,
        )
        .expect("toml");
        let state = AppState::from_parts(cfg, None, "demo".into());

        let replaced = state.get_exercise("introduce-yourself").await.expect("exists");
        assert_eq!(replaced.min_duration, 5);
        assert_eq!(replaced.source, ExerciseSource::LocalBank);

        let added = state.get_exercise("order-coffee").await.expect("exists");
        assert_eq!(added.required_level, 1);
        assert!(added.is_active);
        assert_eq!(state.exercises.read().await.len(), 4);
    }

    #[tokio::test]
    async fn unknown_users_start_at_level_one() {
        let state = AppState::from_parts(TrainerConfig::default(), None, "demo".into());
        let p = state.progress_for("newcomer").await;
        assert_eq!((p.total_points, p.level), (0, 1));
        assert!(!state.users.read().await.contains_key("newcomer"));
        assert_eq!(state.user_or_default(Some("  ")), "demo");
        assert_eq!(state.user_or_default(Some("ana")), "ana");
        assert_eq!(state.user_or_default(None), "demo");
    }
}
