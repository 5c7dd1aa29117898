// Referral code generation
// Codes are the leading characters of a random v4 UUID; uniqueness is enforced by the store

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Length of a generated referral code
pub const CODE_LENGTH: usize = 8;
/// Default number of candidates tried before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum ShortCodeError {
    #[error("Failed to generate unique code after {0} attempts")]
    MaxRetriesExceeded(usize),

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,
}

/// Statistics about code generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStats {
    pub generations: u64,
    pub collisions: u64,
    pub collision_rate: f64,
}

type CandidateSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Produces candidate referral codes and tracks how often they collide
#[derive(Clone)]
pub struct ShortCodeGenerator {
    max_attempts: usize,
    source: Option<CandidateSource>,
    collision_count: Arc<AtomicU64>,
    generation_count: Arc<AtomicU64>,
}

impl std::fmt::Debug for ShortCodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortCodeGenerator")
            .field("max_attempts", &self.max_attempts)
            .field("custom_source", &self.source.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for ShortCodeGenerator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            source: None,
            collision_count: Arc::new(AtomicU64::new(0)),
            generation_count: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ShortCodeGenerator {
    pub fn new(max_attempts: usize) -> Result<Self, ShortCodeError> {
        if max_attempts == 0 {
            return Err(ShortCodeError::InvalidMaxAttempts);
        }

        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    /// Generator drawing candidates from `source` instead of random UUIDs
    pub fn with_source<F>(max_attempts: usize, source: F) -> Result<Self, ShortCodeError>
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        let mut generator = Self::new(max_attempts)?;
        generator.source = Some(Arc::new(source));
        Ok(generator)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// A fresh candidate code, by default CODE_LENGTH lowercase hex characters
    pub fn generate_candidate(&self) -> String {
        self.generation_count.fetch_add(1, Ordering::Relaxed);

        if let Some(source) = &self.source {
            return source();
        }

        let mut code = Uuid::new_v4().to_string();
        code.truncate(CODE_LENGTH);
        code
    }

    /// Record that a candidate was already taken
    pub fn record_collision(&self, candidate: &str, attempt: usize) {
        self.collision_count.fetch_add(1, Ordering::Relaxed);
        warn!(
            code = %candidate,
            attempt,
            max_attempts = self.max_attempts,
            "Referral code collision, retrying"
        );
    }

    /// Draw candidates until `is_taken` rejects none, up to max_attempts
    pub fn generate_unique<F>(&self, mut is_taken: F) -> Result<String, ShortCodeError>
    where
        F: FnMut(&str) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generate_candidate();
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
            self.record_collision(&candidate, attempt);
        }

        Err(ShortCodeError::MaxRetriesExceeded(self.max_attempts))
    }

    pub fn stats(&self) -> GenerationStats {
        let generations = self.generation_count.load(Ordering::Relaxed);
        let collisions = self.collision_count.load(Ordering::Relaxed);
        let collision_rate = if generations > 0 {
            collisions as f64 / generations as f64
        } else {
            0.0
        };

        GenerationStats {
            generations,
            collisions,
            collision_rate,
        }
    }
}
