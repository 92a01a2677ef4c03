//! Topic pattern matching.
//!
//! A subscription pattern is either an exact topic or a prefix ending in
//! `*` (e.g. `com/example/*` matches `com/example/widget/created`).

pub fn matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        assert!(matches("com/example/widget", "com/example/widget"));
        assert!(!matches("com/example/widget", "com/example/gadget"));
    }

    #[test]
    fn wildcard_pattern_matches_by_prefix() {
        assert!(matches("com/example/*", "com/example/widget/created"));
        assert!(!matches("com/example/*", "org/other/widget"));
    }

    #[test]
    fn bare_wildcard_matches_everything() {
        assert!(matches("*", "anything/at/all"));
    }
}
