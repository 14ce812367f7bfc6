//! Answer normalization and matching for auto-graded questions.

const NUMERIC_TOLERANCE: f64 = 0.001;

/// Canonical form used for comparison and stored alongside the raw answer.
///
/// The pipeline order is fixed: trim, lowercase, drop internal whitespace,
/// comma to period, dash variants to hyphen, strip a trailing ".0...", strip
/// a trailing "+".
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            continue;
        }
        match ch {
            ',' => out.push('.'),
            // en dash and true minus sign both arrive from copy-paste
            '\u{2013}' | '\u{2212}' => out.push('-'),
            _ => out.extend(ch.to_lowercase()),
        }
    }

    if let Some(dot) = out.rfind('.') {
        let tail = &out[dot + 1..];
        if !tail.is_empty() && tail.bytes().all(|b| b == b'0') {
            out.truncate(dot);
        }
    }

    if out.ends_with('+') {
        out.pop();
    }

    out
}

/// Matches a raw student answer against the canonical answer and its
/// alternatives. Blank input always rejects.
pub fn matches(raw: &str, canonical: &str, alternatives: &[String]) -> bool {
    let given = normalize(raw);
    if given.is_empty() {
        return false;
    }

    let expected = normalize(canonical);
    if given == expected {
        return true;
    }

    if alternatives.iter().any(|alt| normalize(alt) == given) {
        return true;
    }

    match (given.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() < NUMERIC_TOLERANCE,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_decimal_comma_and_whitespace() {
        assert_eq!(normalize(" 2,0 "), "2");
        assert_eq!(normalize("x = 5"), "x=5");
        assert_eq!(normalize("ОТВЕТ"), "ответ");
    }

    #[test]
    fn normalizes_dash_variants() {
        assert_eq!(normalize("\u{2013}3.14"), "-3.14");
        assert_eq!(normalize("\u{2212}7"), "-7");
    }

    #[test]
    fn strips_trailing_zero_fraction_and_plus() {
        assert_eq!(normalize("42.000"), "42");
        assert_eq!(normalize("5+"), "5");
        // non-zero fraction survives
        assert_eq!(normalize("2.50"), "2.50");
    }

    #[test]
    fn matches_comma_decimal_against_integer_canonical() {
        assert!(matches(" 2,0 ", "2", &[]));
    }

    #[test]
    fn matches_en_dash_negative() {
        assert!(matches("\u{2013}3.14", "-3.14", &[]));
    }

    #[test]
    fn blank_input_always_rejects() {
        assert!(!matches("", "0", &[]));
        assert!(!matches("   ", "2", &[]));
    }

    #[test]
    fn alternatives_are_checked_after_canonical() {
        let alts = vec!["one half".to_string(), "1/2".to_string()];
        assert!(matches("1/2", "0.5", &alts));
        assert!(matches("One Half", "0.5", &alts));
        assert!(!matches("2/3", "0.5", &alts));
    }

    #[test]
    fn numeric_tolerance_is_strict_thousandth() {
        assert!(matches("0.3334", "0.333333", &[]));
        assert!(!matches("0.335", "0.333333", &[]));
    }

    #[test]
    fn coordinate_pair_alternative_is_not_comma_split() {
        // "(1, 2)" as an alternative must match as a whole value.
        let alts = vec!["(1, 2)".to_string()];
        assert!(matches("(1,2)", "x=1;y=2", &alts));
    }
}
