//! Hashtag extraction from transcript text.
//!
//! A tag is `#` followed by one or more word characters (letters, digits,
//! underscore). Extraction is pure and total: no input can fail, and the
//! same token twice yields one tag. Case is preserved.

/// Extract the deduplicated hashtag bodies from `text`, in order of
/// first appearance.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '#' {
            continue;
        }

        let mut body = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                body.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if !body.is_empty() && !tags.contains(&body) {
            tags.push(body);
        }
    }

    tags
}
