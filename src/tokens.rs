//! Token counting for stored documents

/// Estimates how many model tokens a text occupies
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Characters-per-token heuristic: one token per four characters, rounded up
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproxTokenCounter;

impl ApproxTokenCounter {
    const CHARS_PER_TOKEN: usize = 4;
}

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(Self::CHARS_PER_TOKEN)
    }
}
