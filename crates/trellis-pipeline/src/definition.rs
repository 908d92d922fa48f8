//! Filter definitions and URI patterns.
//!
//! A [`FilterDefinition`] is one ordered entry in the pipeline: a URI
//! pattern paired with a filter. Definitions are immutable once the
//! pipeline is built. On a pattern miss the definition is transparent —
//! it passes the exchange straight back to the chain so traversal
//! continues with the next link.

use crate::chain::FilterChain;
use crate::error::PipelineError;
use crate::filter::{BoxFuture, Filter};
use crate::types::Exchange;
use std::fmt;
use std::sync::Arc;

/// A URI matching pattern.
///
/// Three forms are supported:
///
/// - **Prefix** - ends with `*`, e.g. `/users/*` (and `/*` matches
///   everything)
/// - **Suffix** - starts with `*`, e.g. `*.json`
/// - **Literal** - anything else, matched exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriPattern {
    /// Exact path match.
    Literal(String),
    /// Match paths starting with the given prefix.
    Prefix(String),
    /// Match paths ending with the given suffix.
    Suffix(String),
}

impl UriPattern {
    /// Parses a raw pattern string into its matching form.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_pipeline::UriPattern;
    ///
    /// assert!(UriPattern::new("/users/*").matches("/users/42"));
    /// assert!(UriPattern::new("*.json").matches("/api/data.json"));
    /// assert!(UriPattern::new("/health").matches("/health"));
    /// assert!(!UriPattern::new("/health").matches("/healthz"));
    /// ```
    #[must_use]
    pub fn new(raw: &str) -> Self {
        if let Some(prefix) = raw.strip_suffix('*') {
            Self::Prefix(prefix.to_string())
        } else if let Some(suffix) = raw.strip_prefix('*') {
            Self::Suffix(suffix.to_string())
        } else {
            Self::Literal(raw.to_string())
        }
    }

    /// Returns `true` if the pattern matches the given path.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(literal) => path == literal,
            Self::Prefix(prefix) => path.starts_with(prefix),
            Self::Suffix(suffix) => path.ends_with(suffix),
        }
    }
}

impl fmt::Display for UriPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Suffix(suffix) => write!(f, "*{suffix}"),
        }
    }
}

/// One configured filter: match criteria plus the filtering operation.
///
/// Cloning a definition is cheap; the filter itself is shared behind an
/// `Arc`.
#[derive(Clone)]
pub struct FilterDefinition {
    pattern: UriPattern,
    filter: Arc<dyn Filter>,
}

impl FilterDefinition {
    /// Creates a definition binding a filter to a pattern.
    #[must_use]
    pub fn new(pattern: UriPattern, filter: Arc<dyn Filter>) -> Self {
        Self { pattern, filter }
    }

    /// Returns the definition's pattern.
    #[must_use]
    pub fn pattern(&self) -> &UriPattern {
        &self.pattern
    }

    /// Returns the name of the underlying filter.
    #[must_use]
    pub fn filter_name(&self) -> &'static str {
        self.filter.name()
    }

    /// Runs this link of the chain.
    ///
    /// If the pattern matches the request path the filter runs with the
    /// chain as its continuation; otherwise this link is skipped and the
    /// chain advances directly.
    pub(crate) fn do_filter<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        chain: &'a mut dyn FilterChain,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            if self.pattern.matches(exchange.path()) {
                self.filter.apply(exchange, chain).await
            } else {
                chain.proceed(exchange).await
            }
        })
    }
}

impl fmt::Debug for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDefinition")
            .field("pattern", &self.pattern)
            .field("filter", &self.filter.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = UriPattern::new("/users");
        assert_eq!(pattern, UriPattern::Literal("/users".to_string()));
        assert!(pattern.matches("/users"));
        assert!(!pattern.matches("/users/42"));
        assert!(!pattern.matches("/user"));
    }

    #[test]
    fn test_prefix_pattern() {
        let pattern = UriPattern::new("/users/*");
        assert_eq!(pattern, UriPattern::Prefix("/users/".to_string()));
        assert!(pattern.matches("/users/42"));
        assert!(pattern.matches("/users/42/orders"));
        assert!(!pattern.matches("/users"));
        assert!(!pattern.matches("/accounts/1"));
    }

    #[test]
    fn test_match_all_pattern() {
        let pattern = UriPattern::new("/*");
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/anything/at/all"));
    }

    #[test]
    fn test_suffix_pattern() {
        let pattern = UriPattern::new("*.json");
        assert_eq!(pattern, UriPattern::Suffix(".json".to_string()));
        assert!(pattern.matches("/api/data.json"));
        assert!(!pattern.matches("/api/data.xml"));
    }

    #[test]
    fn test_pattern_display_roundtrip() {
        for raw in ["/users", "/users/*", "*.json", "/*"] {
            assert_eq!(UriPattern::new(raw).to_string(), raw);
        }
    }
}
