//! Prompt pool — finite seed strings drawn at random without replacement.

use rand::Rng;

/// Seed prompts used when no prompt file is configured.
const DEFAULT_PROMPTS: &[&str] = &[
    "What is 2+2?",
    "Name the largest planet in the solar system.",
    "What is the capital of France?",
    "Spell the word 'necessary' backwards.",
    "What is 12 multiplied by 12?",
    "Name a prime number greater than 50.",
    "Which element has the chemical symbol O?",
    "How many days are in a leap year?",
    "Translate 'thank you' into Spanish.",
    "What color do you get by mixing blue and yellow?",
    "Give a synonym for 'quick'.",
    "What is the square root of 81?",
];

/// The built-in prompt seed.
pub fn default_prompts() -> Vec<String> {
    DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect()
}

/// Finite pool of prompts. Once empty it stays empty.
#[derive(Debug, Clone, Default)]
pub struct PromptPool {
    remaining: Vec<String>,
}

impl PromptPool {
    pub fn new(prompts: Vec<String>) -> Self {
        Self { remaining: prompts }
    }

    /// Remove and return a random prompt, or `None` once exhausted.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<String> {
        if self.remaining.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.remaining.len());
        Some(self.remaining.swap_remove(idx))
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
