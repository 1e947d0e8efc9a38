//! Built-in speaking exercises so the service is useful without any config file.

use crate::domain::{ExerciseSource, SpeakingExercise};

fn words(ws: &[&str]) -> Vec<String> {
  ws.iter().map(|w| w.to_string()).collect()
}

pub fn seed_exercises() -> Vec<SpeakingExercise> {
  vec![
    SpeakingExercise {
      id: "introduce-yourself".into(),
      title: "Introduce Yourself".into(),
      description: "Practice introducing yourself in English".into(),
      difficulty: "Beginner".into(),
      category: "conversation".into(),
      prompt: "Introduce yourself to a new friend. Include your name, where you're from, what you do, and one interesting hobby you have. Speak for at least 30 seconds.".into(),
      context: Some("Imagine you're at a social event and meeting someone for the first time.".into()),
      target_words: words(&["name", "from", "work", "study", "hobby", "enjoy", "like"]),
      min_duration: 30,
      max_duration: Some(60),
      is_active: true,
      required_level: 1,
      order: 1,
      tags: words(&["beginner", "introduction", "social"]),
      source: ExerciseSource::Seed,
    },
    SpeakingExercise {
      id: "favorite-place".into(),
      title: "Describe Your Favorite Place".into(),
      description: "Describe a place you love to visit".into(),
      difficulty: "Intermediate".into(),
      category: "description".into(),
      prompt: "Describe your favorite place to visit. Explain where it is, what it looks like, what you can do there, and why you love it. Try to use descriptive adjectives and speak for at least 1 minute.".into(),
      context: Some("Think of a place that brings you joy - it could be a park, a beach, a city, or even a room in your house.".into()),
      target_words: words(&["located", "beautiful", "peaceful", "exciting", "atmosphere", "scenery", "relaxing", "memorable"]),
      min_duration: 60,
      max_duration: Some(120),
      is_active: true,
      required_level: 2,
      order: 2,
      tags: words(&["intermediate", "description", "travel"]),
      source: ExerciseSource::Seed,
    },
    SpeakingExercise {
      id: "technology-opinion".into(),
      title: "Present Your Opinion on Technology".into(),
      description: "Share your views on technology's impact on society".into(),
      difficulty: "Advanced".into(),
      category: "presentation".into(),
      prompt: "Present your opinion on how technology has changed the way we communicate. Discuss both positive and negative aspects, provide examples, and conclude with your overall perspective. Speak for 1.5 to 2 minutes.".into(),
      context: Some("This is a formal presentation. Structure your thoughts clearly with an introduction, main points, and conclusion.".into()),
      target_words: words(&["communication", "social media", "connectivity", "isolation", "convenience", "privacy", "innovation", "balance"]),
      min_duration: 90,
      max_duration: Some(120),
      is_active: true,
      required_level: 3,
      order: 3,
      tags: words(&["advanced", "opinion", "technology", "presentation"]),
      source: ExerciseSource::Seed,
    },
  ]
}
