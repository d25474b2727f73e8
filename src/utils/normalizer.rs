use std::{collections::HashSet, sync::OnceLock};

use ahash::RandomState;
use regex::Regex;
use tracing::warn;

use crate::config::DEFAULT_STOP_WORDS;

/// markup tag, inner text is kept
fn tag_re() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static tag regex"))
}

/// every code point of general category P*
fn punctuation_re() -> &'static Regex {
    static PUNCT_RE: OnceLock<Regex> = OnceLock::new();
    PUNCT_RE.get_or_init(|| Regex::new(r"\p{P}").expect("static punctuation regex"))
}

/// a maximal run of word characters, i.e. the span between two `\b`
fn word_re() -> &'static Regex {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    WORD_RE.get_or_init(|| Regex::new(r"\w+").expect("static word regex"))
}

/// TextNormalizer
/// Turns raw record text into a whitespace tokenizable token bag.
///
/// Steps, in order:
/// 1. remove markup tags (inner text is kept)
/// 2. remove stop words (case-sensitive, whole word)
/// 3. remove punctuation (Unicode general category `P*`)
/// 4. lower-case
///
/// Stop words are matched before lower-casing, so `"The"` survives a stop list
/// containing `"the"` and comes out as `"the"`.
///
/// # Examples
/// ```
/// use related_vectorizer::TextNormalizer;
/// let normalizer = TextNormalizer::new(["and"]);
/// assert_eq!(normalizer.normalize("<p>Cats and <b>Dogs</b>!</p>"), "cats  dogs");
/// ```
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    stop_words: HashSet<Box<str>, RandomState>,
}

impl TextNormalizer {
    /// Create a normalizer removing the given stop words.
    /// Blank entries are ignored, so are entries that are not a single word
    /// (those are logged).
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::with_hasher(RandomState::new());
        for word in stop_words {
            let word = word.as_ref().trim();
            if word.is_empty() {
                continue;
            }
            match word_re().find(word) {
                Some(m) if m.start() == 0 && m.end() == word.len() => {
                    set.insert(Box::from(word));
                }
                _ => warn!(word, "stop word is not a single word, ignored"),
            }
        }
        Self { stop_words: set }
    }

    /// Normalizer without any stop words
    pub fn without_stop_words() -> Self {
        Self {
            stop_words: HashSet::with_hasher(RandomState::new()),
        }
    }

    /// Number of distinct stop words
    pub fn stop_word_count(&self) -> usize {
        self.stop_words.len()
    }

    /// Normalize a text into a token bag
    pub fn normalize(&self, text: &str) -> String {
        let text = tag_re().replace_all(text, "");
        let text = self.remove_stop_words(&text);
        punctuation_re().replace_all(&text, "").to_lowercase()
    }

    fn remove_stop_words(&self, text: &str) -> String {
        if self.stop_words.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for word in word_re().find_iter(text) {
            if self.stop_words.contains(word.as_str()) {
                out.push_str(&text[last..word.start()]);
                last = word.end();
            }
        }
        out.push_str(&text[last..]);
        out
    }
}

impl Default for TextNormalizer {
    /// Normalizer with the built-in English stop list
    fn default() -> Self {
        Self::new(DEFAULT_STOP_WORDS.iter().copied())
    }
}
