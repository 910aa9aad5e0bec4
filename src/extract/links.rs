//! Prioritized link extraction
//!
//! Links are pulled from `<a href>` tags (plus the canonical link) and given a
//! [`LinkPriority`] tier from the region of the page they sit in. The region
//! selectors are chosen per framework; anchors outside every known region are
//! treated as content links.
//!
//! # Link Extraction Rules
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` links
//! - Data URIs
//! - Fragment-only (same page) anchors
//! - Anything that is not http(s) after resolution
//!
//! **Note:** `rel="nofollow"` links ARE followed

use super::{ExtractError, Framework, FrameworkDetector, LinkSelector, MarkerDetector};
use crate::crawler::{DiscoveredLink, LinkPriority};
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use url::Url;

type Profile = &'static [(&'static str, LinkPriority)];

/// Regions shared by every framework
const GENERIC_PROFILE: Profile = &[
    (
        ".sidebar a[href], aside a[href], .toc a[href], .table-of-contents a[href], #TableOfContents a[href]",
        LinkPriority::TableOfContents,
    ),
    ("nav a[href], header a[href]", LinkPriority::Navigation),
    ("main a[href], article a[href]", LinkPriority::Content),
    ("footer a[href]", LinkPriority::Footer),
];

fn framework_profile(framework: Framework) -> Profile {
    match framework {
        Framework::Docusaurus => &[
            (
                ".theme-doc-sidebar-container a[href], .menu a[href]",
                LinkPriority::TableOfContents,
            ),
            (".navbar a[href]", LinkPriority::Navigation),
        ],
        Framework::MkDocs => &[
            (
                ".md-nav--primary a[href], .md-sidebar--primary a[href]",
                LinkPriority::TableOfContents,
            ),
            (".md-header a[href], .md-tabs a[href]", LinkPriority::Navigation),
        ],
        Framework::Sphinx => &[
            (
                ".sphinxsidebar a[href], .wy-menu a[href], .toctree-wrapper a[href]",
                LinkPriority::TableOfContents,
            ),
            (".related a[href], .wy-breadcrumbs a[href]", LinkPriority::Navigation),
        ],
        Framework::VitePress => &[
            (".VPSidebar a[href]", LinkPriority::TableOfContents),
            (".VPNav a[href]", LinkPriority::Navigation),
        ],
        Framework::Nextra => &[
            (".nextra-sidebar-container a[href]", LinkPriority::TableOfContents),
            (".nextra-nav-container a[href]", LinkPriority::Navigation),
        ],
        Framework::Hugo => &[(
            "#sidebar a[href], .docs-menu a[href], .td-sidebar a[href]",
            LinkPriority::TableOfContents,
        )],
        Framework::Docsify => &[
            (".sidebar-nav a[href]", LinkPriority::TableOfContents),
            (".app-nav a[href]", LinkPriority::Navigation),
        ],
        Framework::GitBook | Framework::SinglePageApp | Framework::Unknown => &[],
    }
}

const ALL_FRAMEWORKS: [Framework; 10] = [
    Framework::Docusaurus,
    Framework::MkDocs,
    Framework::Sphinx,
    Framework::VitePress,
    Framework::GitBook,
    Framework::Nextra,
    Framework::Hugo,
    Framework::Docsify,
    Framework::SinglePageApp,
    Framework::Unknown,
];

/// Framework-aware [`LinkSelector`]
///
/// Detects the framework of each page and applies that framework's region
/// selectors before the generic ones. When a URL appears in several regions
/// the highest tier wins; output order is first appearance in the document.
pub struct LinkRegistry {
    detector: Arc<dyn FrameworkDetector>,
    profiles: HashMap<Framework, Vec<(Selector, LinkPriority)>>,
    anchors: Option<Selector>,
    canonical: Option<Selector>,
}

impl LinkRegistry {
    pub fn new(detector: Arc<dyn FrameworkDetector>) -> Self {
        let profiles = ALL_FRAMEWORKS
            .iter()
            .map(|&framework| {
                let selectors = framework_profile(framework)
                    .iter()
                    .chain(GENERIC_PROFILE.iter())
                    .filter_map(|(css, priority)| {
                        Selector::parse(css).ok().map(|sel| (sel, *priority))
                    })
                    .collect();
                (framework, selectors)
            })
            .collect();

        Self {
            detector,
            profiles,
            anchors: Selector::parse("a[href]").ok(),
            canonical: Selector::parse("link[rel='canonical'][href]").ok(),
        }
    }

    /// Extracts links using an explicit framework profile
    pub fn extract_with(
        &self,
        framework: Framework,
        html: &str,
        base_url: &Url,
    ) -> Vec<DiscoveredLink> {
        let document = Html::parse_document(html);
        let mut collected = CollectedLinks::default();

        // Every anchor in document order, all starting as content links
        if let Some(anchors) = &self.anchors {
            for element in document.select(anchors) {
                if element.value().attr("download").is_some() {
                    continue;
                }
                if let Some(href) = element.value().attr("href") {
                    if let Some(url) = resolve_link(href, base_url) {
                        collected.insert(url, LinkPriority::Content);
                    }
                }
            }
        }

        if let Some(canonical) = &self.canonical {
            for element in document.select(canonical) {
                if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                    collected.insert(url, LinkPriority::Content);
                }
            }
        }

        // Upgrade by region
        if let Some(selectors) = self.profiles.get(&framework) {
            for (selector, priority) in selectors {
                for element in document.select(selector) {
                    if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                        collected.place(&url, *priority);
                    }
                }
            }
        }

        collected.into_links()
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new(Arc::new(MarkerDetector::new()))
    }
}

impl LinkSelector for LinkRegistry {
    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<DiscoveredLink>, ExtractError> {
        let base = Url::parse(base_url).map_err(|source| ExtractError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let framework = self.detector.detect(html);
        Ok(self.extract_with(framework, html, &base))
    }
}

/// Insertion-ordered URL → priority map
///
/// Anchors start with a fallback tier. The first region that matches a URL
/// replaces that fallback, later regions can only raise it.
#[derive(Default)]
struct CollectedLinks {
    order: Vec<String>,
    priorities: HashMap<String, LinkPriority>,
    placed: HashSet<String>,
}

impl CollectedLinks {
    fn insert(&mut self, url: String, fallback: LinkPriority) {
        if !self.priorities.contains_key(&url) {
            self.order.push(url.clone());
            self.priorities.insert(url, fallback);
        }
    }

    fn place(&mut self, url: &str, priority: LinkPriority) {
        let Some(existing) = self.priorities.get_mut(url) else {
            return;
        };
        if self.placed.insert(url.to_string()) || priority > *existing {
            *existing = priority;
        }
    }

    fn into_links(mut self) -> Vec<DiscoveredLink> {
        self.order
            .into_iter()
            .filter_map(|url| {
                let priority = self.priorities.remove(&url)?;
                Some(DiscoveredLink::new(url, priority))
            })
            .collect()
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    // Skip empty hrefs
    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    // Same page anchors
    if href.starts_with('#') {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
