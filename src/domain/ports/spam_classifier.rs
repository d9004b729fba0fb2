use crate::domain::errors::DomainResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpamScore {
    pub is_spam: bool,
    pub confidence: f64,
}

/// Frozen scoring function. Implementations are read-only after construction
/// and shared across tasks without locking.
pub trait SpamClassifier: Send + Sync {
    fn score_text(&self, text: &str) -> DomainResult<SpamScore>;
}
