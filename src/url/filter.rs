use crate::HarvestError;
use regex::Regex;

/// Include-filter built from a project's persisted URL patterns
///
/// Patterns are regular expressions, one per line. A URL passes when any
/// pattern matches somewhere in it; a filter with no patterns passes
/// everything.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    patterns: Vec<Regex>,
}

impl UrlFilter {
    /// Compiles newline-separated patterns
    ///
    /// Blank lines and surrounding whitespace are ignored.
    ///
    /// # Returns
    ///
    /// * `Ok(UrlFilter)` - All patterns compiled
    /// * `Err(HarvestError::InvalidFilter)` - The first pattern that failed, with the regex error
    pub fn from_patterns(patterns: &str) -> Result<Self, HarvestError> {
        Self::from_lines(patterns.lines())
    }

    /// Compiles an explicit list of patterns
    pub fn from_lines<'a, I>(lines: I) -> Result<Self, HarvestError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut patterns = Vec::new();
        for line in lines {
            let pattern = line.trim();
            if pattern.is_empty() {
                continue;
            }
            let regex = Regex::new(pattern).map_err(|source| HarvestError::InvalidFilter {
                pattern: pattern.to_string(),
                source,
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    /// Returns true if the filter has no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Checks whether a URL passes the filter
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(url))
    }
}
