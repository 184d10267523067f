//! Read-side helpers shared by the user and friend views
//!
//! Stored tags are a single comma-joined string. Tags are joined verbatim:
//! a tag that itself contains the delimiter, or an empty tag, cannot survive
//! a join/split round trip. Ingest reports such tags as warnings instead of
//! escaping them.

/// Separator used when flattening a tag list into one stored column
pub const TAG_DELIMITER: char = ',';

/// Substitute a display default for an absent value
pub fn fallback<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.unwrap_or(default)
}

/// Flatten an ordered tag list into its stored form
pub fn join_tags(tags: &[String]) -> String {
    tags.join(&TAG_DELIMITER.to_string())
}

/// Re-expand a stored tag string
///
/// An empty stored value yields no tags, never a single empty tag.
pub fn split_tags(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored.split(TAG_DELIMITER).map(str::to_string).collect()
}

/// Whether a tag survives `join_tags` followed by `split_tags` unchanged
pub fn tag_round_trips(tag: &str) -> bool {
    !tag.is_empty() && !tag.contains(TAG_DELIMITER)
}
