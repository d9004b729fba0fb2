pub mod model;
pub mod preprocess;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::spam_classifier::{SpamClassifier, SpamScore};
use model::ModelFile;
use preprocess::TextPreprocessor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Logistic regression
    Lr,
    /// Multinomial naive Bayes
    Nb,
}

impl ModelType {
    pub fn file_name(&self) -> String {
        format!("model_{}.json", self)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Lr => write!(f, "lr"),
            ModelType::Nb => write!(f, "nb"),
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lr" => Ok(ModelType::Lr),
            "nb" => Ok(ModelType::Nb),
            other => Err(format!(
                "Unknown model type '{}'; expected 'lr' or 'nb'",
                other
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierLoadError {
    #[error("Model file not found at {0}")]
    Missing(PathBuf),

    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed model file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Invalid(String),

    #[error("Failed to build text preprocessor: {0}")]
    Preprocessor(#[from] regex::Error),
}

/// Frozen TF-IDF + linear model loaded once at startup and shared read-only.
pub struct PretrainedSpamClassifier {
    preprocessor: TextPreprocessor,
    model: ModelFile,
}

impl PretrainedSpamClassifier {
    /// Load `<dir>/model_<type>.json`.
    pub fn load_from_dir(
        dir: impl AsRef<Path>,
        model_type: ModelType,
    ) -> Result<Self, ClassifierLoadError> {
        Self::load(dir.as_ref().join(model_type.file_name()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierLoadError::Missing(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path).map_err(|source| ClassifierLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let classifier = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), "Spam classifier loaded");
        Ok(classifier)
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierLoadError> {
        let model: ModelFile = serde_json::from_str(json)?;
        model.validate().map_err(ClassifierLoadError::Invalid)?;
        Ok(Self {
            preprocessor: TextPreprocessor::new()?,
            model,
        })
    }
}

impl SpamClassifier for PretrainedSpamClassifier {
    fn score_text(&self, text: &str) -> DomainResult<SpamScore> {
        let tokens = self.preprocessor.tokens(text);
        let features = self.model.vectorizer.transform(&tokens);
        let p_spam = self.model.estimator.spam_probability(&features);

        if !p_spam.is_finite() {
            return Err(DomainError::Classification(format!(
                "Model produced a non-finite score ({})",
                p_spam
            )));
        }

        let is_spam = p_spam > 0.5;
        let label = if is_spam { "spam" } else { "ham" };
        metrics::counter!("mailsentry_emails_classified_total", "label" => label).increment(1);

        Ok(SpamScore {
            is_spam,
            confidence: p_spam.max(1.0 - p_spam),
        })
    }
}
