use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Unigram TF-IDF vectorizer exported from a fitted model.
#[derive(Debug, Clone, Deserialize)]
pub struct TfidfVectorizer {
    pub vocabulary: HashMap<String, usize>,
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
}

impl TfidfVectorizer {
    /// Sparse `(feature, weight)` pairs, sorted by feature index.
    pub fn transform(&self, tokens: &[String]) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokens {
            // Single-character tokens never reach the vocabulary.
            if token.chars().count() < 2 {
                continue;
            }
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                let idf = self
                    .idf
                    .as_ref()
                    .and_then(|idf| idf.get(index).copied())
                    .unwrap_or(1.0);
                (index, tf * idf)
            })
            .collect();
        features.sort_by_key(|(index, _)| *index);

        let norm = match self.norm {
            Some(Norm::L2) => features.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            Some(Norm::L1) => features.iter().map(|(_, w)| w.abs()).sum::<f64>(),
            None => 1.0,
        };
        if norm > 0.0 {
            for (_, w) in features.iter_mut() {
                *w /= norm;
            }
        }
        features
    }

    /// Width of the feature space implied by the vocabulary.
    pub fn dimension(&self) -> usize {
        self.vocabulary.values().max().map(|m| m + 1).unwrap_or(0)
    }
}

/// Binary estimator; class index 1 is spam.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression {
        coef: Vec<f64>,
        intercept: f64,
    },
    MultinomialNb {
        class_log_prior: [f64; 2],
        feature_log_prob: [Vec<f64>; 2],
    },
}

impl Estimator {
    pub fn dimension(&self) -> usize {
        match self {
            Estimator::LogisticRegression { coef, .. } => coef.len(),
            Estimator::MultinomialNb {
                feature_log_prob, ..
            } => feature_log_prob[0].len(),
        }
    }

    /// Probability of the spam class.
    pub fn spam_probability(&self, features: &[(usize, f64)]) -> f64 {
        match self {
            Estimator::LogisticRegression { coef, intercept } => {
                let z = intercept
                    + features
                        .iter()
                        .map(|(i, w)| coef.get(*i).copied().unwrap_or(0.0) * w)
                        .sum::<f64>();
                1.0 / (1.0 + (-z).exp())
            }
            Estimator::MultinomialNb {
                class_log_prior,
                feature_log_prob,
            } => {
                let joint = |class: usize| {
                    class_log_prior[class]
                        + features
                            .iter()
                            .map(|(i, w)| {
                                feature_log_prob[class].get(*i).copied().unwrap_or(0.0) * w
                            })
                            .sum::<f64>()
                };
                let (ham, spam) = (joint(0), joint(1));
                // log-sum-exp
                let max = ham.max(spam);
                let spam_exp = (spam - max).exp();
                spam_exp / ((ham - max).exp() + spam_exp)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelFile {
    pub vectorizer: TfidfVectorizer,
    pub estimator: Estimator,
}

impl ModelFile {
    pub fn validate(&self) -> Result<(), String> {
        let vocab_dim = self.vectorizer.dimension();
        let estimator_dim = self.estimator.dimension();

        if vocab_dim == 0 {
            return Err("vocabulary is empty".to_string());
        }
        if estimator_dim < vocab_dim {
            return Err(format!(
                "estimator has {} features but vocabulary needs {}",
                estimator_dim, vocab_dim
            ));
        }
        if let Some(idf) = &self.vectorizer.idf {
            if idf.len() != estimator_dim {
                return Err(format!(
                    "idf has {} entries, estimator has {} features",
                    idf.len(),
                    estimator_dim
                ));
            }
        }
        if let Estimator::MultinomialNb {
            feature_log_prob, ..
        } = &self.estimator
        {
            if feature_log_prob[0].len() != feature_log_prob[1].len() {
                return Err("feature_log_prob rows differ in length".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer(norm: Option<Norm>, sublinear_tf: bool) -> TfidfVectorizer {
        TfidfVectorizer {
            vocabulary: [("free".to_string(), 0), ("prize".to_string(), 1)]
                .into_iter()
                .collect(),
            idf: Some(vec![2.0, 1.0]),
            sublinear_tf,
            norm,
        }
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_transform_applies_idf_and_l2_norm() {
        let v = vectorizer(Some(Norm::L2), false);
        let features = v.transform(&tokens(&["free", "prize", "unknown", "x"]));

        let expected_norm = (4.0f64 + 1.0).sqrt();
        assert_eq!(features.len(), 2);
        assert!((features[0].1 - 2.0 / expected_norm).abs() < 1e-12);
        assert!((features[1].1 - 1.0 / expected_norm).abs() < 1e-12);
    }

    #[test]
    fn test_sublinear_tf_without_norm() {
        let v = vectorizer(None, true);
        let features = v.transform(&tokens(&["prize", "prize", "prize"]));
        assert_eq!(features, vec![(1, 1.0 + 3.0f64.ln())]);
    }

    #[test]
    fn test_naive_bayes_probability_is_softmax() {
        let nb = Estimator::MultinomialNb {
            class_log_prior: [0.5f64.ln(), 0.5f64.ln()],
            feature_log_prob: [vec![0.2f64.ln(), 0.8f64.ln()], vec![0.8f64.ln(), 0.2f64.ln()]],
        };
        let p = nb.spam_probability(&[(0, 1.0)]);
        assert!((p - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_short_coefficients() {
        let model = ModelFile {
            vectorizer: vectorizer(Some(Norm::L2), false),
            estimator: Estimator::LogisticRegression {
                coef: vec![1.0],
                intercept: 0.0,
            },
        };
        assert!(model.validate().is_err());
    }
}
