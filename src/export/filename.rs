use regex::Regex;
use std::sync::OnceLock;

use crate::certificate::resolver::trailing_digits;
use crate::certificate::BRAND;

const MAX_SEGMENT_LEN: usize = 50;

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Lowercases, strips everything but ASCII letters, digits and whitespace,
/// turns whitespace runs into `-` and caps the result at 50 characters.
pub fn sanitize_segment(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped = non_alphanumeric().replace_all(&lowered, "");
    let hyphenated = whitespace_runs().replace_all(&stripped, "-");
    hyphenated.chars().take(MAX_SEGMENT_LEN).collect()
}

/// `BYAMN-Certificate-<course>-<student>-<last 6 digits of the ms timestamp>`, no extension.
pub fn pdf_basename(course_title: &str, student_name: &str, now_millis: i64) -> String {
    format!(
        "{}-Certificate-{}-{}-{}",
        BRAND,
        sanitize_segment(course_title.trim()),
        sanitize_segment(student_name.trim()),
        trailing_digits(now_millis, 6)
    )
}

pub fn fallback_png_filename(course_title: &str, student_name: &str) -> String {
    let dash = |s: &str| whitespace_runs().replace_all(s.trim(), "-").into_owned();
    format!(
        "{}-Certificate-{}-{}.png",
        BRAND,
        dash(course_title),
        dash(student_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_punctuation() {
        assert_eq!(sanitize_segment("Intro: C++ & Systems!"), "intro-c-systems");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(80);
        assert_eq!(sanitize_segment(&long).len(), 50);
    }

    #[test]
    fn test_sanitize_drops_non_ascii_letters() {
        assert_eq!(sanitize_segment("José Núñez"), "jos-nez");
    }

    #[test]
    fn test_pdf_basename() {
        assert_eq!(
            pdf_basename("Systems 101", "Jane Doe", 1_700_000_123_456),
            "BYAMN-Certificate-systems-101-jane-doe-123456"
        );
    }

    #[test]
    fn test_fallback_png_keeps_case_and_punctuation() {
        assert_eq!(
            fallback_png_filename("Intro: C++  Systems", "Jane Doe"),
            "BYAMN-Certificate-Intro:-C++-Systems-Jane-Doe.png"
        );
    }
}
