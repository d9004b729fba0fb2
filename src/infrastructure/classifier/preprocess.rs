use regex::Regex;
use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "youre", "youve",
    "youll", "youd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "shes", "her", "hers", "herself", "it", "its", "itself", "they", "them", "their",
    "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "thatll", "these",
    "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "dont", "should", "shouldve", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "arent", "couldn", "couldnt", "didn",
    "didnt", "doesn", "doesnt", "hadn", "hadnt", "hasn", "hasnt", "haven", "havent", "isn",
    "isnt", "ma", "mightn", "mightnt", "mustn", "mustnt", "needn", "neednt", "shan", "shant",
    "shouldn", "shouldnt", "wasn", "wasnt", "weren", "werent", "won", "wont", "wouldn",
    "wouldnt",
];

/// Irregular plurals the suffix rules would get wrong.
const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("people", "people"),
    ("news", "news"),
    ("series", "series"),
    ("species", "species"),
    ("quizzes", "quiz"),
    // -ches nouns whose singular keeps the e
    ("aches", "ache"),
    ("headaches", "headache"),
    ("caches", "cache"),
    ("niches", "niche"),
    ("avalanches", "avalanche"),
    ("moustaches", "moustache"),
];

/// Text normalization applied before vectorizing.
///
/// lowercase, strip digits, strip punctuation, whitespace tokenize, drop
/// English stop-words, lemmatize each token as a noun.
pub struct TextPreprocessor {
    digits: Regex,
    punctuation: Regex,
    stop_words: HashSet<&'static str>,
    irregular: HashMap<&'static str, &'static str>,
}

impl TextPreprocessor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            digits: Regex::new(r"\d+")?,
            punctuation: Regex::new(r"[^\w\s]")?,
            stop_words: STOP_WORDS.iter().copied().collect(),
            irregular: IRREGULAR.iter().copied().collect(),
        })
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let no_digits = self.digits.replace_all(&lowered, "");
        let cleaned = self.punctuation.replace_all(&no_digits, "");

        cleaned
            .split_whitespace()
            .filter(|token| !self.stop_words.contains(*token))
            .map(|token| self.lemmatize(token))
            .collect()
    }

    /// Noun lemma via suffix rules.
    pub fn lemmatize(&self, token: &str) -> String {
        if let Some(lemma) = self.irregular.get(token) {
            return lemma.to_string();
        }
        if token.chars().count() <= 3 {
            return token.to_string();
        }
        if let Some(stem) = token.strip_suffix("ies") {
            return format!("{}y", stem);
        }
        // Sibilant stems take -es; a single z (prizes, sizes) only takes -s.
        for suffix in ["sses", "zzes", "xes", "ches", "shes"] {
            if token.ends_with(suffix) {
                return token[..token.len() - 2].to_string();
            }
        }
        if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
            return token.to_string();
        }
        match token.strip_suffix('s') {
            Some(stem) => stem.to_string(),
            None => token.to_string(),
        }
    }
}
