//! Function/variable classification of map symbols
//!
//! Map tables do not say whether a row is code or data, so the split is a
//! naming heuristic. It is a strategy so other toolchains can plug in their
//! own rule without touching the row parser.

use crate::config::SymbolConfig;
use crate::types::SymbolKind;

/// Decides which sub-index a symbol name belongs to
pub trait SymbolClassifier: Send + Sync {
    fn classify(&self, name: &str) -> SymbolKind;
}

impl<F> SymbolClassifier for F
where
    F: Fn(&str) -> SymbolKind + Send + Sync,
{
    fn classify(&self, name: &str) -> SymbolKind {
        self(name)
    }
}

/// Keyword heuristic
///
/// A name is a function if it contains one of the keywords (case-insensitive),
/// or if it has no `.` and starts with an upper-case letter. Known to misfile
/// names like `Rte_Buffer` (function) and `can_rx_cb` (variable).
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &SymbolConfig) -> Self {
        Self::new(&config.function_keywords)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::from_config(&SymbolConfig::default())
    }
}

impl SymbolClassifier for KeywordClassifier {
    fn classify(&self, name: &str) -> SymbolKind {
        let lower = name.to_lowercase();
        if self.keywords.iter().any(|k| lower.contains(k.as_str())) {
            return SymbolKind::Function;
        }

        let starts_upper = name.chars().next().is_some_and(char::is_uppercase);
        if !name.contains('.') && starts_upper {
            SymbolKind::Function
        } else {
            SymbolKind::Variable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify("can_rx_handler"), SymbolKind::Function);
        assert_eq!(classifier.classify("OS_Schedule"), SymbolKind::Function);
        assert_eq!(classifier.classify("app_MAIN_loop"), SymbolKind::Function);
    }

    #[test]
    fn test_uppercase_without_dot() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify("Rte_Buffer"), SymbolKind::Function);
        assert_eq!(classifier.classify("Rte_Buffer.field"), SymbolKind::Variable);
        assert_eq!(classifier.classify("vehicle_speed"), SymbolKind::Variable);
    }

    #[test]
    fn test_closure_strategy() {
        let everything_is_data = |_: &str| SymbolKind::Variable;
        assert_eq!(everything_is_data.classify("main"), SymbolKind::Variable);
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = KeywordClassifier::new(["_cbk"]);
        assert_eq!(classifier.classify("com_rx_CBK"), SymbolKind::Function);
        assert_eq!(classifier.classify("com_rx_buf"), SymbolKind::Variable);
    }
}
