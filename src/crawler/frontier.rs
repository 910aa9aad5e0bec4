//! Priority frontier with fragment-insensitive deduplication
//!
//! Discovered links wait here until the walk coordinator dispatches them.
//! A Bloom filter remembers every URL ever pushed, so a page is enqueued at
//! most once per frontier even after it has been popped.

use crate::url::strip_fragment;
use crate::HarvestError;
use bloomfilter::Bloom;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, PoisonError};

/// Default number of distinct URLs the seen-set is sized for
pub const DEFAULT_FRONTIER_CAPACITY: usize = 100_000;

/// Default false-positive rate of the seen-set
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.001;

/// Where on a page a link was found, highest priority last
///
/// The ordering only decides which queued page is visited next; it never
/// changes which pages are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkPriority {
    Footer = 0,
    Content = 1,
    Navigation = 2,
    TableOfContents = 3,
}

/// A link found on a page, tagged with its priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: String,
    pub priority: LinkPriority,
}

impl DiscoveredLink {
    pub fn new(url: impl Into<String>, priority: LinkPriority) -> Self {
        Self {
            url: url.into(),
            priority,
        }
    }
}

/// Heap entry: priority first, then insertion order (earlier wins)
#[derive(Debug)]
struct QueuedLink {
    link: DiscoveredLink,
    seq: u64,
}

impl Ord for QueuedLink {
    fn cmp(&self, other: &Self) -> Ordering {
        self.link
            .priority
            .cmp(&other.link.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedLink {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedLink {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedLink {}

struct FrontierState {
    queue: BinaryHeap<QueuedLink>,
    seen: Bloom<str>,
    next_seq: u64,
}

/// Thread-safe priority queue of discovered links
///
/// Created fresh for every walk, seeded with the source URL and discarded
/// when the walk ends.
pub struct Frontier {
    state: Mutex<FrontierState>,
}

impl Frontier {
    /// Creates an empty frontier whose seen-set is sized for `capacity`
    /// distinct URLs at the given false-positive rate
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - Ready to accept links
    /// * `Err(HarvestError::Frontier)` - The sizing parameters were rejected
    pub fn new(capacity: usize, false_positive_rate: f64) -> Result<Self, HarvestError> {
        if capacity == 0 || !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(HarvestError::Frontier(format!(
                "cannot size seen-set for {} items at rate {}",
                capacity, false_positive_rate
            )));
        }

        let seen = Bloom::new_for_fp_rate(capacity, false_positive_rate).map_err(|e| {
            HarvestError::Frontier(format!(
                "cannot size seen-set for {} items at rate {}: {:?}",
                capacity, false_positive_rate, e
            ))
        })?;

        Ok(Self {
            state: Mutex::new(FrontierState {
                queue: BinaryHeap::new(),
                seen,
                next_seq: 0,
            }),
        })
    }

    /// Creates a frontier with the default sizing
    pub fn with_defaults() -> Result<Self, HarvestError> {
        Self::new(DEFAULT_FRONTIER_CAPACITY, DEFAULT_FALSE_POSITIVE_RATE)
    }

    /// Enqueues a link unless an equivalent URL was pushed before
    ///
    /// The `#fragment` is stripped before both the dedup check and storage.
    ///
    /// # Returns
    ///
    /// * `true` - The link was enqueued
    /// * `false` - The fragment-stripped URL had already been seen
    pub fn push(&self, link: DiscoveredLink) -> bool {
        let url = strip_fragment(&link.url).to_string();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // check_and_set reports whether the URL was already present
        if state.seen.check_and_set(url.as_str()) {
            return false;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueuedLink {
            link: DiscoveredLink {
                url,
                priority: link.priority,
            },
            seq,
        });
        true
    }

    /// Removes and returns the highest-priority queued link
    pub fn pop(&self) -> Option<DiscoveredLink> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.queue.pop().map(|queued| queued.link)
    }

    /// Number of links currently queued
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue
            .len()
    }

    /// Returns whether no links are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks whether a URL (fragment ignored) was ever pushed
    pub fn seen(&self, url: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.seen.check(strip_fragment(url))
    }
}
