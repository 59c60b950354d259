//! Keyword heuristics over free-form names.

/// Ordered exclusion and inclusion keyword lists matched against lowercase text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordClassifier {
    excluded: Vec<String>,
    included: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<E, I>(excluded: E, included: I) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let lower = |word: &str| word.trim().to_ascii_lowercase();
        Self {
            excluded: excluded
                .into_iter()
                .map(|w| lower(w.as_ref()))
                .filter(|w| !w.is_empty())
                .collect(),
            included: included
                .into_iter()
                .map(|w| lower(w.as_ref()))
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Classifier with only an inclusion list.
    pub fn including<I>(included: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self::new(std::iter::empty::<&str>(), included)
    }

    /// First exclusion keyword found in `text`.
    pub fn excluded_by(&self, text: &str) -> Option<&str> {
        let text = text.to_ascii_lowercase();
        self.excluded
            .iter()
            .find(|word| text.contains(word.as_str()))
            .map(String::as_str)
    }

    /// First inclusion keyword found in `text`.
    pub fn included_by(&self, text: &str) -> Option<&str> {
        let text = text.to_ascii_lowercase();
        self.included
            .iter()
            .find(|word| text.contains(word.as_str()))
            .map(String::as_str)
    }

    /// No exclusion keyword and at least one inclusion keyword.
    pub fn matches(&self, text: &str) -> bool {
        self.excluded_by(text).is_none() && self.included_by(text).is_some()
    }
}
