//! Task Classifier
//!
//! Maps a free-text task description onto a [`Category`] using ordered
//! phrase matchers. Matching is case-insensitive substring search and the
//! first matcher with a hit wins, so the order of the list is the priority
//! order. Descriptions that match nothing fall back to the default category.

use crate::router::Category;
use std::sync::LazyLock;

/// Phrases that select one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatcher {
    /// Category selected on a hit
    pub category: Category,
    /// Lowercase phrases searched for in the description
    pub phrases: Vec<String>,
}

impl CategoryMatcher {
    /// Create a matcher; phrases are lowercased
    pub fn new<I, S>(category: Category, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            category,
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    fn find(&self, lowered: &str) -> Option<&str> {
        self.phrases
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }
}

/// Ordered phrase classifier
#[derive(Debug, Clone)]
pub struct TaskClassifier {
    matchers: Vec<CategoryMatcher>,
    default: Category,
}

impl TaskClassifier {
    /// Build a classifier from an ordered matcher list
    #[must_use]
    pub fn new(matchers: Vec<CategoryMatcher>) -> Self {
        Self {
            matchers,
            default: Category::Reasoning,
        }
    }

    /// Category returned when nothing matches
    #[must_use]
    pub fn with_default(mut self, default: Category) -> Self {
        self.default = default;
        self
    }

    /// Classify a task description
    ///
    /// Deterministic and total: every input maps to exactly one category.
    #[must_use]
    pub fn classify(&self, description: &str) -> Category {
        self.matched_phrase(description)
            .map_or(self.default, |(category, _)| category)
    }

    /// The matching category and the phrase that selected it
    #[must_use]
    pub fn matched_phrase(&self, description: &str) -> Option<(Category, &str)> {
        let lowered = description.to_lowercase();
        self.matchers
            .iter()
            .find_map(|m| m.find(&lowered).map(|phrase| (m.category, phrase)))
    }

    /// Matchers in priority order
    #[must_use]
    pub fn matchers(&self) -> &[CategoryMatcher] {
        &self.matchers
    }
}

impl Default for TaskClassifier {
    fn default() -> Self {
        Self::new(vec![
            CategoryMatcher::new(
                Category::SelfReflection,
                [
                    "self reflection",
                    "analyze performance",
                    "internal analysis",
                    "performance review",
                    "self assessment",
                ],
            ),
            CategoryMatcher::new(
                Category::CriticalAnalysis,
                [
                    "critical analysis",
                    "structured argument",
                    "strategic decision",
                    "partnership",
                    "high stakes",
                    "important analysis",
                ],
            ),
            CategoryMatcher::new(
                Category::CodeGeneration,
                [
                    "write code",
                    "generate script",
                    "create function",
                    "implement",
                    "program",
                    "code",
                    "script",
                    "module",
                    "class",
                ],
            ),
            CategoryMatcher::new(
                Category::Documentation,
                [
                    "explain",
                    "document",
                    "summary",
                    "summarize",
                    "documentation",
                    "readme",
                    "guide",
                    "tutorial",
                ],
            ),
            CategoryMatcher::new(
                Category::QuickAnswer,
                [
                    "quick",
                    "simple",
                    "lookup",
                    "check",
                    "verify",
                    "what is",
                    "how to",
                    "tell me",
                ],
            ),
        ])
    }
}

/// Classifier with the built-in phrase table
pub static DEFAULT_CLASSIFIER: LazyLock<TaskClassifier> = LazyLock::new(TaskClassifier::default);

/// Classify with the built-in phrase table
#[must_use]
pub fn classify(description: &str) -> Category {
    DEFAULT_CLASSIFIER.classify(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_reasoning() {
        assert_eq!(classify(""), Category::Reasoning);
        assert_eq!(classify("ponder the nature of time"), Category::Reasoning);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("Write Code for a parser"), Category::CodeGeneration);
        assert_eq!(classify("EXPLAIN monads"), Category::Documentation);
    }

    #[test]
    fn test_first_matcher_wins() {
        // "code" and "explain" both appear; code generation is checked first
        assert_eq!(
            classify("explain this code"),
            Category::CodeGeneration
        );
        assert_eq!(
            classify("quick self assessment of the agent"),
            Category::SelfReflection
        );
        assert_eq!(
            classify("critical analysis of a partnership proposal"),
            Category::CriticalAnalysis
        );
    }

    #[test]
    fn test_quick_answers() {
        assert_eq!(classify("what is the capital of France"), Category::QuickAnswer);
        assert_eq!(classify("tell me a fact"), Category::QuickAnswer);
    }

    #[test]
    fn test_matched_phrase_reports_hit() {
        let classifier = TaskClassifier::default();
        let (category, phrase) = classifier
            .matched_phrase("Please summarize the meeting")
            .unwrap();
        assert_eq!(category, Category::Documentation);
        assert_eq!(phrase, "summarize");
        assert!(classifier.matched_phrase("hmm").is_none());
    }

    #[test]
    fn test_custom_matchers() {
        let classifier = TaskClassifier::new(vec![CategoryMatcher::new(
            Category::QuickAnswer,
            ["PING"],
        )])
        .with_default(Category::Documentation);

        assert_eq!(classifier.classify("ping the host"), Category::QuickAnswer);
        assert_eq!(classifier.classify("write code"), Category::Documentation);
    }

    #[test]
    fn test_deterministic() {
        let inputs = ["", "implement a cache", "verify the result", "äöü 🙂"];
        for input in inputs {
            assert_eq!(classify(input), classify(input));
        }
    }
}
