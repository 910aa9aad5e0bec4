//! Documentation framework detection

use super::FrameworkDetector;
use scraper::{Html, Selector};
use std::fmt;

/// Documentation generators the harvester knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framework {
    Docusaurus,
    MkDocs,
    Sphinx,
    VitePress,
    GitBook,
    Nextra,
    Hugo,
    Docsify,
    /// Client-rendered application shell of no specific generator
    SinglePageApp,
    Unknown,
}

impl Framework {
    /// Whether pages from this framework need JavaScript to render content
    ///
    /// Returns `None` when the answer is not known and has to be measured.
    pub fn requires_js(self) -> Option<bool> {
        match self {
            Framework::Docusaurus
            | Framework::MkDocs
            | Framework::Sphinx
            | Framework::VitePress
            | Framework::GitBook
            | Framework::Nextra
            | Framework::Hugo => Some(false),
            Framework::Docsify | Framework::SinglePageApp => Some(true),
            Framework::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Docusaurus => "docusaurus",
            Framework::MkDocs => "mkdocs",
            Framework::Sphinx => "sphinx",
            Framework::VitePress => "vitepress",
            Framework::GitBook => "gitbook",
            Framework::Nextra => "nextra",
            Framework::Hugo => "hugo",
            Framework::Docsify => "docsify",
            Framework::SinglePageApp => "spa",
            Framework::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<meta name="generator">` prefixes, matched case-insensitively
const GENERATORS: &[(&str, Framework)] = &[
    ("docusaurus", Framework::Docusaurus),
    ("mkdocs", Framework::MkDocs),
    ("sphinx", Framework::Sphinx),
    ("vitepress", Framework::VitePress),
    ("gitbook", Framework::GitBook),
    ("nextra", Framework::Nextra),
    ("hugo", Framework::Hugo),
    ("docsify", Framework::Docsify),
];

/// DOM markers checked when no generator tag is present
const MARKERS: &[(&str, Framework)] = &[
    ("#__docusaurus, .theme-doc-markdown", Framework::Docusaurus),
    ("[data-md-component], .md-content", Framework::MkDocs),
    (".sphinxsidebar, .wy-nav-side, .toctree-wrapper", Framework::Sphinx),
    ("#VPContent, .VPDoc", Framework::VitePress),
    ("[class*=\"gitbook\"]", Framework::GitBook),
    (".nextra-content, .nextra-nav-container", Framework::Nextra),
    ("script[src*=\"docsify\"]", Framework::Docsify),
];

/// Client-side mount points that indicate an unrendered application shell
const SPA_ROOTS: &str = "#root, #app, #__next, #__nuxt";

/// Detects frameworks from generator meta tags and characteristic markup
pub struct MarkerDetector {
    generator: Option<Selector>,
    markers: Vec<(Selector, Framework)>,
    spa_roots: Option<Selector>,
}

impl MarkerDetector {
    pub fn new() -> Self {
        Self {
            generator: Selector::parse("meta[name=\"generator\"][content]").ok(),
            markers: MARKERS
                .iter()
                .filter_map(|(css, framework)| Selector::parse(css).ok().map(|s| (s, *framework)))
                .collect(),
            spa_roots: Selector::parse(SPA_ROOTS).ok(),
        }
    }

    fn from_generator(&self, document: &Html) -> Option<Framework> {
        let selector = self.generator.as_ref()?;
        document.select(selector).find_map(|meta| {
            let content = meta.value().attr("content")?.trim().to_ascii_lowercase();
            GENERATORS
                .iter()
                .find(|(prefix, _)| content.starts_with(prefix))
                .map(|(_, framework)| *framework)
        })
    }

    fn from_markers(&self, document: &Html) -> Option<Framework> {
        self.markers
            .iter()
            .find(|(selector, _)| document.select(selector).next().is_some())
            .map(|(_, framework)| *framework)
    }

    /// An empty mount point with no other visible text in the body
    fn is_app_shell(&self, document: &Html) -> bool {
        let Some(selector) = &self.spa_roots else {
            return false;
        };

        let empty_root = document.select(selector).any(|root| {
            root.children().all(|child| match child.value() {
                scraper::Node::Text(text) => text.trim().is_empty(),
                scraper::Node::Comment(_) => true,
                _ => false,
            })
        });

        empty_root && !body_has_text(document)
    }
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameworkDetector for MarkerDetector {
    fn detect(&self, html: &str) -> Framework {
        let document = Html::parse_document(html);

        self.from_generator(&document)
            .or_else(|| self.from_markers(&document))
            .unwrap_or_else(|| {
                if self.is_app_shell(&document) {
                    Framework::SinglePageApp
                } else {
                    Framework::Unknown
                }
            })
    }
}

fn body_has_text(document: &Html) -> bool {
    let Ok(body) = Selector::parse("body") else {
        return false;
    };

    document.select(&body).any(|el| {
        el.descendants().any(|node| match node.value() {
            scraper::Node::Text(text) => {
                !text.trim().is_empty()
                    && node
                        .parent()
                        .and_then(|p| p.value().as_element().map(|e| e.name()))
                        .map_or(true, |name| !matches!(name, "script" | "style" | "noscript"))
            }
            _ => false,
        })
    })
}
