//! Refusal detection: spotting syntactically fine responses where the
//! provider broke character (identified itself as a search tool or an AI,
//! or declined the creative task).

use regex_lite::Regex;
use tracing::warn;

/// Case-insensitive whole-word match against a fixed phrase denylist.
///
/// Phrases only match on word boundaries, so "as an ai" never fires on
/// "as an airship".
#[derive(Debug, Clone, Default)]
pub struct RefusalDetector {
    phrases: Vec<(String, Regex)>,
}

impl RefusalDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .filter_map(|p| match phrase_pattern(&p) {
                Ok(re) => Some((p, re)),
                Err(e) => {
                    warn!(phrase = %p, error = %e, "Skipping unusable refusal phrase");
                    None
                }
            })
            .collect();
        Self { phrases }
    }

    /// The first denylisted phrase found in `text`, if any.
    pub fn matched(&self, text: &str) -> Option<&str> {
        if self.phrases.is_empty() {
            return None;
        }
        let lower = text.to_lowercase();
        self.phrases
            .iter()
            .find(|(_, re)| re.is_match(&lower))
            .map(|(p, _)| p.as_str())
    }
}

/// Escaped phrase with a `\b` on each side that starts or ends in a word
/// character.
fn phrase_pattern(phrase: &str) -> Result<Regex, regex_lite::Error> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pattern = String::new();
    if phrase.starts_with(is_word) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex_lite::escape(phrase));
    if phrase.ends_with(is_word) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern)
}
