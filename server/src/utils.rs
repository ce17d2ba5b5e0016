use regex::Regex;

/// Normalize free text for matching: underscores to spaces, strip anything
/// that is not alphanumeric/dash/space, collapse runs of spaces, lowercase.
pub fn normalize(input: &str) -> String {
    let replace = Regex::new(r"[_]").unwrap();
    let mut s = replace.replace_all(input, " ").into_owned();

    let clean_re = Regex::new(r"[^A-Za-z0-9- ]").unwrap();
    s = clean_re.replace_all(&s, "").into_owned();

    s = s.trim().to_string();

    let collapse = Regex::new(r" +").unwrap();
    collapse.replace_all(&s, " ").into_owned().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn test_basic() {
        assert_eq!(normalize("hello_world"), "hello world");
        assert_eq!(normalize("Rust-lang"), "rust-lang");
        assert_eq!(normalize("clean-this_text!"), "clean-this text");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(normalize("   hello   "), "hello");
        assert_eq!(normalize("  multiple   spaces  "), "multiple spaces");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(normalize("!@#$%^&*()"), "");
        assert_eq!(normalize("abc123!@#"), "abc123");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("     "), "");
    }
}
