//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::domain::{SpeakingAttempt, SpeakingExercise, UserProgress};
use crate::evaluation::ResponseEvaluation;
use crate::scoring::{AttemptInput, ExerciseConfig, Feedback, ScoringResult};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListExercises {
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
        #[serde(default)]
        difficulty: Option<String>,
        #[serde(default)]
        category: Option<String>,
    },
    GetExercise {
        #[serde(rename = "exerciseId")]
        exercise_id: String,
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
    },
    SubmitAttempt {
        #[serde(rename = "exerciseId")]
        exercise_id: String,
        attempt: AttemptIn,
    },
    Score {
        exercise: ExerciseConfig,
        attempt: AttemptInput,
    },
    Stats {
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
    },
    Leaderboard,
    Evaluate(EvaluateIn),
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Exercises {
        exercises: Vec<ExerciseListItem>,
    },
    Exercise {
        detail: ExerciseDetailOut,
    },
    AttemptResult {
        result: AttemptOut,
    },
    ScoreResult {
        result: ScoringResult,
    },
    Stats {
        stats: StatsOut,
    },
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    Evaluation {
        result: EvaluateOut,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExercisesQuery {
    pub user_id: Option<String>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Catalog entry: the exercise plus the caller's latest attempt and the total attempt count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseListItem {
    #[serde(flatten)]
    pub exercise: SpeakingExercise,
    pub latest_attempt: Option<SpeakingAttempt>,
    pub attempt_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExercisesOut {
    pub exercises: Vec<ExerciseListItem>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseDetailOut {
    pub exercise: SpeakingExercise,
    /// The caller's attempts, newest first.
    pub attempts: Vec<SpeakingAttempt>,
}

/// A speaking submission. `transcription` may be typed by the learner; when it is empty
/// and `autoTranscribe` is set, `audioBase64` is sent to the transcription service.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptIn {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub transcription: Option<String>,
    /// Whole seconds; form-style clients send it as a string.
    #[serde(default, deserialize_with = "whole_seconds")]
    pub duration: u32,
    #[serde(default)]
    pub auto_transcribe: bool,
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
}

fn whole_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    match Raw::deserialize(d) {
        Ok(Raw::Number(n)) => Ok(n),
        Ok(Raw::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| de::Error::custom(format!("duration must be whole seconds, got {:?}", s))),
        Err(_) => Err(de::Error::custom("duration must be a non-negative whole number of seconds")),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOut {
    pub attempt: SpeakingAttempt,
    pub score: u32,
    pub completed: bool,
    pub points_earned: u32,
    pub feedback: Feedback,
    pub transcription: String,
    pub progress: UserProgress,
}

#[derive(Debug, Deserialize)]
pub struct ScoreIn {
    pub exercise: ExerciseConfig,
    pub attempt: AttemptInput,
}

/// Free-form answer check: the learner's response against the expected answer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateIn {
    #[serde(default)]
    pub user_response: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub exercise_type: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateOut {
    pub success: bool,
    pub evaluation: ResponseEvaluation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOut {
    pub user: UserProgress,
    pub total_attempts: usize,
    pub completed_attempts: usize,
    /// Percent of attempts that completed; 0 when there are none.
    pub accuracy: u32,
    pub leaderboard_position: usize,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub points: u32,
    pub level: u32,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub grader: bool,
}
