//! Path and object-key helpers

pub use skydav_store::quote;
use skydav_store::DELIMITER;

/// Collapse repeated delimiters and drop leading ones
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == DELIMITER && (out.is_empty() || out.ends_with(DELIMITER)) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Split a client path into container and object key.
///
/// Returns `None` for the root. The key has no leading or trailing
/// delimiter and may be empty.
pub fn split_path(path: &str) -> Option<(String, String)> {
    let mut segments = path.split(DELIMITER).filter(|s| !s.is_empty());
    let container = segments.next()?.to_string();
    let key = segments.collect::<Vec<_>>().join("/");
    Some((container, key))
}

/// Join a collection prefix (empty or ending in the delimiter) and a name
pub fn join(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.trim_start_matches(DELIMITER))
}

/// Key of the pseudo-directory marker for `name`
pub fn marker_key(name: &str) -> String {
    format!("{}{}", name.trim_end_matches(DELIMITER), DELIMITER)
}

/// Last path segment, ignoring a trailing delimiter
pub fn last_segment(key: &str) -> &str {
    let trimmed = key.trim_end_matches(DELIMITER);
    trimmed.rsplit(DELIMITER).next().unwrap_or(trimmed)
}

/// Replace the `from` prefix of `key` with `to`
pub fn rebase(key: &str, from: &str, to: &str) -> Option<String> {
    key.strip_prefix(from).map(|rest| format!("{}{}", to, rest))
}

/// Client-visible path of a container/key pair
pub fn client_path(container: &str, key: &str) -> String {
    if key.is_empty() {
        format!("/{}", container)
    } else {
        format!("/{}/{}", container, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("//a///b/", "a/b/")]
    #[case("/a", "a")]
    #[case("a/b", "a/b")]
    #[case("///", "")]
    fn test_sanitize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    #[rstest]
    #[case("/", None)]
    #[case("", None)]
    #[case("/c", Some(("c", "")))]
    #[case("/c/", Some(("c", "")))]
    #[case("/c/a//b/", Some(("c", "a/b")))]
    fn test_split_path(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
        let expected = expected.map(|(c, k)| (c.to_string(), k.to_string()));
        assert_eq!(split_path(input), expected);
    }

    #[test]
    fn test_marker_and_segments() {
        assert_eq!(marker_key("a/b"), "a/b/");
        assert_eq!(marker_key("a/b/"), "a/b/");
        assert_eq!(last_segment("a/b/"), "b");
        assert_eq!(last_segment("file"), "file");
        assert_eq!(join("a/", "b"), "a/b");
        assert_eq!(join("", "b"), "b");
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("d/p/q", "d/", "e/").as_deref(), Some("e/p/q"));
        assert_eq!(rebase("d/", "d/", "").as_deref(), Some(""));
        assert_eq!(rebase("x/p", "d/", "e/"), None);
    }

    #[test]
    fn test_client_path() {
        assert_eq!(client_path("c", ""), "/c");
        assert_eq!(client_path("c", "a/b"), "/c/a/b");
    }
}
