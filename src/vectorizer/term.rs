use std::collections::HashMap;

use ahash::RandomState;

/// TermFrequency
/// Raw occurrence count of each term within one record's token bag.
///
/// # Examples
/// ```
/// use related_vectorizer::TermFrequency;
/// let term_freq = TermFrequency::from_text("cat dog cat");
///
/// assert_eq!(term_freq.term_count("cat"), 2);
/// assert_eq!(term_freq.term_sum(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TermFrequency {
    counts: HashMap<Box<str>, u32, RandomState>,
    total: u64,
}

impl TermFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every whitespace separated term of a normalized text
    pub fn from_text(text: &str) -> Self {
        let mut tf = Self::new();
        for term in text.split_whitespace() {
            tf.add_term(term);
        }
        tf
    }

    #[inline]
    pub fn add_term(&mut self, term: &str) -> &mut Self {
        *self.counts.entry(term.into()).or_insert(0) += 1;
        self.total += 1;
        self
    }

    /// Occurrences of `term`, 0 when absent
    #[inline]
    pub fn term_count(&self, term: &str) -> u32 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    /// Occurrences of all terms
    #[inline]
    pub fn term_sum(&self) -> u64 {
        self.total
    }

    /// Distinct terms, in no particular order
    #[inline]
    pub fn term_set_iter(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(|term| &**term)
    }

    /// Number of distinct terms
    #[inline]
    pub fn term_num(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
