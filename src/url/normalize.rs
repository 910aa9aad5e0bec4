/// Removes the `#fragment` part of a URL, keeping the query string
///
/// Fragments never denote a distinct fetchable resource, so every
/// deduplication and storage path works on the stripped form. The input is
/// treated as an opaque string: no other normalization takes place.
///
/// # Examples
///
/// ```
/// use docharvest::url::strip_fragment;
///
/// assert_eq!(strip_fragment("https://example.com/a?x=1#top"), "https://example.com/a?x=1");
/// assert_eq!(strip_fragment("https://example.com/a"), "https://example.com/a");
/// ```
pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}
