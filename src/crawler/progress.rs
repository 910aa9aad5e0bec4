//! Crawl progress reporting

use std::fmt;

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// Emitted once on the sitemap path, with the known total
    Started,
    /// A page was saved
    Completed,
    /// A page failed at some pipeline step
    Failed,
    /// Emitted exactly once, at the end of every run
    Finished,
}

/// A progress update delivered to the caller's callback
///
/// `completed` counts pages resolved so far, saved or failed. `total` is 0
/// when the number of pages is unknown (link-following mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub completed: usize,
    pub total: usize,
    pub url: String,
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn started(total: usize) -> Self {
        Self {
            kind: ProgressKind::Started,
            completed: 0,
            total,
            url: String::new(),
            error: None,
        }
    }

    pub fn completed(completed: usize, total: usize, url: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Completed,
            completed,
            total,
            url: url.into(),
            error: None,
        }
    }

    pub fn failed(
        completed: usize,
        total: usize,
        url: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            kind: ProgressKind::Failed,
            completed,
            total,
            url: url.into(),
            error: Some(error.to_string()),
        }
    }

    pub fn finished(completed: usize, total: usize) -> Self {
        Self {
            kind: ProgressKind::Finished,
            completed,
            total,
            url: String::new(),
            error: None,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counter = if self.total > 0 {
            format!("[{}/{}]", self.completed, self.total)
        } else {
            format!("[{}]", self.completed)
        };

        match self.kind {
            ProgressKind::Started => write!(f, "Crawling {} pages", self.total),
            ProgressKind::Completed => write!(f, "{} saved {}", counter, self.url),
            ProgressKind::Failed => write!(
                f,
                "{} failed {}: {}",
                counter,
                self.url,
                self.error.as_deref().unwrap_or("unknown error")
            ),
            ProgressKind::Finished => write!(f, "Finished: {} pages processed", self.completed),
        }
    }
}
