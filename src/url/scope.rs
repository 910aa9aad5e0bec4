use crate::url::extract_domain;
use crate::HarvestError;
use url::Url;

/// Host and path-prefix boundary of a link-following walk
///
/// Derived from the source URL: a discovered link is in scope when it has
/// the same host and port and its path starts with the source path. Ports
/// are compared after filling in the scheme default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    host: String,
    port: Option<u16>,
    prefix: String,
}

impl Scope {
    /// Builds the scope of a walk rooted at `source`
    pub fn from_source(source: &str) -> Result<Self, HarvestError> {
        let url = Url::parse(source).map_err(|e| HarvestError::InvalidUrl {
            url: source.to_string(),
            source: e,
        })?;
        Self::from_url(&url).ok_or_else(|| HarvestError::InvalidUrl {
            url: source.to_string(),
            source: url::ParseError::EmptyHost,
        })
    }

    /// Builds the scope of an already parsed URL; None when it has no host
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: extract_domain(url)?,
            port: url.port_or_known_default(),
            prefix: url.path().to_string(),
        })
    }

    /// Host every in-scope link must share
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path prefix every in-scope link must start with
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Checks whether an absolute URL string lies inside the scope
    pub fn contains(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.contains_url(&parsed),
            Err(_) => false,
        }
    }

    /// Checks whether a parsed URL lies inside the scope
    pub fn contains_url(&self, url: &Url) -> bool {
        extract_domain(url).as_deref() == Some(self.host.as_str())
            && url.port_or_known_default() == self.port
            && url.path().starts_with(&self.prefix)
    }
}
