//! Message matching: lowercase substring keywords or compiled regexes.

use regex::{Regex, RegexBuilder};

use crate::error::SearchError;

#[derive(Clone, Debug)]
pub enum Matcher {
    /// Case-insensitive substring match.
    Keyword { raw: String, needle: String },
    /// Regular expression, case-insensitive unless requested otherwise.
    Pattern { regex: Regex, case_sensitive: bool },
}

impl Matcher {
    pub fn keyword(keyword: &str) -> Self {
        Matcher::Keyword {
            raw: keyword.to_string(),
            needle: keyword.to_lowercase(),
        }
    }

    pub fn pattern(pattern: &str, case_sensitive: bool) -> Result<Self, SearchError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .size_limit(1 << 20)
            .build()
            .map_err(|e| SearchError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Matcher::Pattern {
            regex,
            case_sensitive,
        })
    }

    /// Interpret free text typed in chat.
    ///
    /// - `"exact phrase"` → keyword without the quotes
    /// - `/expr/` → case-insensitive pattern
    /// - anything else → keyword
    pub fn parse_query(raw: &str) -> Result<Self, SearchError> {
        let q = raw.trim();
        let quoted = q
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| q.strip_prefix('“').and_then(|s| s.strip_suffix('”')));
        if let Some(phrase) = quoted.filter(|p| !p.is_empty()) {
            return Ok(Matcher::keyword(phrase));
        }
        if let Some(expr) = q
            .strip_prefix('/')
            .and_then(|s| s.strip_suffix('/'))
            .filter(|e| !e.is_empty())
        {
            return Matcher::pattern(expr, false);
        }
        Ok(Matcher::keyword(q))
    }

    /// Messages without text never match.
    pub fn is_match(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match self {
            Matcher::Keyword { needle, .. } => text.to_lowercase().contains(needle.as_str()),
            Matcher::Pattern { regex, .. } => regex.is_match(text),
        }
    }

    /// Display form: the keyword itself, or `/pattern/`.
    pub fn describe(&self) -> String {
        match self {
            Matcher::Keyword { raw, .. } => raw.clone(),
            Matcher::Pattern { regex, .. } => format!("/{}/", regex.as_str()),
        }
    }

    /// Stable identity for cache keys.
    pub fn cache_key(&self) -> String {
        match self {
            Matcher::Keyword { needle, .. } => format!("k:{needle}"),
            Matcher::Pattern {
                regex,
                case_sensitive,
            } => format!("p:{}:{}", case_sensitive, regex.as_str()),
        }
    }

    /// Lowercased keyword, excluded from top-word statistics. Patterns have none.
    pub fn keyword_lower(&self) -> Option<&str> {
        match self {
            Matcher::Keyword { needle, .. } => Some(needle),
            Matcher::Pattern { .. } => None,
        }
    }
}
