//! # Topic Filters
//!
//! A filter is an ordered set of topic patterns. A pattern is either an exact
//! topic or a prefix followed by the `.*` wildcard.
//!
//! ## Wildcard Rule
//!
//! Pattern `p1.p2...pn.*` matches topic `t1.t2...tm` iff `m >= n-1` and
//! `ti == pi` for every `i <= n-1`. The prefix itself therefore matches,
//! partial segments never do:
//!
//! | pattern                          | topic                             | match |
//! |----------------------------------|-----------------------------------|-------|
//! | `dt.physical.event.property.*`   | `dt.physical.event.property.t`    | yes   |
//! | `dt.physical.event.property.*`   | `dt.physical.event.property.t.r`  | yes   |
//! | `dt.physical.event.property.*`   | `dt.physical.event.property`      | yes   |
//! | `dt.physical.event.property.*`   | `dt.physical.event.propertyX`     | no    |
//! | `dt.physical.event.property.*`   | `dt.physical.event`               | no    |
//!
//! The bare pattern `*` matches every topic.

use crate::topics::MULTI_LEVEL_WILDCARD;

const WILDCARD_SUFFIX: &str = ".*";

/// Prefix of a wildcard pattern, `Some("")` for the bare wildcard.
fn wildcard_prefix(pattern: &str) -> Option<&str> {
    if pattern == MULTI_LEVEL_WILDCARD {
        Some("")
    } else {
        pattern.strip_suffix(WILDCARD_SUFFIX)
    }
}

/// Whether `pattern` ends in the multi-level wildcard.
#[must_use]
pub fn is_wildcard_pattern(pattern: &str) -> bool {
    wildcard_prefix(pattern).is_some()
}

/// Whether `pattern` matches `topic`. Case-sensitive, segment-exact.
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    match wildcard_prefix(pattern) {
        None => pattern == topic,
        Some("") => true,
        Some(prefix) => {
            let mut topic_segments = topic.split('.');
            prefix
                .split('.')
                .all(|segment| topic_segments.next() == Some(segment))
        }
    }
}

/// Ordered set of topic patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    patterns: Vec<String>,
}

impl TopicFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from patterns, dropping duplicates.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::new();
        for pattern in patterns {
            filter.add(pattern);
        }
        filter
    }

    /// Append a pattern. Returns `false` if it was already present.
    pub fn add(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        if self.patterns.contains(&pattern) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|p| p == pattern)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    /// True if the filter holds `topic` exactly or a wildcard matching it.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.patterns.iter().any(|p| topic_matches(p, topic))
    }
}

impl<S: Into<String>> FromIterator<S> for TopicFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_patterns(iter)
    }
}
