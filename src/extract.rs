//! Verification-code extraction from message text.

use std::sync::LazyLock;

use regex::Regex;

/// Ordered extraction patterns, most specific first. Labeled markers are
/// trusted over the bare-digit fallback, which is the most prone to false
/// positives (phone numbers, dates).
static PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        // Chinese 验证码 marker with full- or half-width colon
        Regex::new(r"验证码[：:]\s*([A-Za-z0-9]{4,8})").expect("valid pattern"),
        Regex::new(r"(?i)verification code[：:]\s*([A-Za-z0-9]{4,8})").expect("valid pattern"),
        Regex::new(r"(?i)code[：:]\s*([A-Za-z0-9]{4,8})").expect("valid pattern"),
        // Token enclosed in full-width brackets
        Regex::new(r"【([A-Za-z0-9]{4,8})】").expect("valid pattern"),
        // Fallback: standalone run of 4-8 digits
        Regex::new(r"\b(\d{4,8})\b").expect("valid pattern"),
    ]
});

/// Extract a short verification code from free-form message text.
///
/// Applies the pattern list in order; the first pattern that matches
/// anywhere in the text wins and its first capture group is returned.
pub fn extract_code(text: &str) -> Option<String> {
    PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_marker_fullwidth_colon() {
        assert_eq!(extract_code("验证码：8839"), Some("8839".into()));
    }

    #[test]
    fn chinese_marker_ascii_colon() {
        assert_eq!(extract_code("您的验证码: ZX81QQ 请勿泄露"), Some("ZX81QQ".into()));
    }

    #[test]
    fn english_marker_case_insensitive() {
        assert_eq!(
            extract_code("Your Verification Code: 442199"),
            Some("442199".into())
        );
    }

    #[test]
    fn generic_code_marker_alphanumeric() {
        assert_eq!(extract_code("your code: AB12"), Some("AB12".into()));
    }

    #[test]
    fn fullwidth_brackets() {
        assert_eq!(extract_code("【392811】"), Some("392811".into()));
    }

    #[test]
    fn bare_digit_fallback() {
        assert_eq!(extract_code("Use 73621 to sign in"), Some("73621".into()));
    }

    #[test]
    fn labeled_marker_beats_bare_digits() {
        // Bare digits appear first in the text, but the labeled marker has
        // higher priority in the pattern order.
        let text = "Ref 20260101. 验证码：9War77 thanks";
        assert_eq!(extract_code(text), Some("9War77".into()));
    }

    #[test]
    fn bracket_beats_bare_digits() {
        let text = "sent at 10:30, token 【55aa66】 expires in 1200 seconds";
        assert_eq!(extract_code(text), Some("55aa66".into()));
    }

    #[test]
    fn hyphenated_digits_are_not_joined() {
        // "555" is too short for the fallback; "1234" is the first
        // standalone 4-8 digit run. The runs are never concatenated.
        assert_eq!(extract_code("call 555-1234 today"), Some("1234".into()));
    }

    #[test]
    fn nine_digit_run_matches_its_prefix() {
        // \b(\d{4,8})\b requires non-alphanumeric boundaries on both sides,
        // so a 9-digit run yields nothing from its own digits.
        assert_eq!(extract_code("order 123456789x pending"), None);
    }

    #[test]
    fn no_code_present() {
        assert_eq!(extract_code("no codes here"), None);
    }

    #[test]
    fn empty_text() {
        assert_eq!(extract_code(""), None);
    }

    #[test]
    fn too_short_token_after_marker_falls_through() {
        // "code: 123" does not satisfy the 4-char minimum; with no other
        // candidates the result is absent.
        assert_eq!(extract_code("code: 123"), None);
    }
}
