//! Numeric parsing of kubernetes quantity strings.
//!
//! Semantic equality compares quantities by value, not formatting:
//! `100m` equals `0.1`, `1Gi` equals `1073741824`. `k8s-openapi` keeps
//! quantities as opaque strings, so the decimal/SI/binary grammar is
//! handled here.

/// Parses a quantity literal (`100m`, `0.5`, `2Gi`, `1e3`, `500n`) into its
/// numeric value. Returns `None` for anything that is not a quantity.
pub(crate) fn parse_quantity(literal: &str) -> Option<f64> {
    let literal = literal.trim();
    if literal.is_empty() {
        return None;
    }

    let (number, suffix) = split_suffix(literal);
    let value: f64 = number.parse().ok()?;

    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => return None,
    };

    Some(value * multiplier)
}

/// Splits a quantity literal into its number part and its unit suffix.
/// Scientific-exponent forms (`1e3`, `2.5E-2`) have no suffix; the exponent
/// belongs to the number.
fn split_suffix(literal: &str) -> (&str, &str) {
    let bytes = literal.as_bytes();

    let mut index = 0;
    // Optional sign.
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        index += 1;
    }

    let mut seen_digit = false;
    while index < bytes.len() {
        match bytes[index] {
            b'0'..=b'9' | b'.' => {
                seen_digit = true;
                index += 1;
            }
            // An exponent marker followed by more number is part of the
            // number; a bare trailing `E` is the exa suffix.
            b'e' | b'E' if seen_digit && index + 1 < bytes.len() => {
                let next = bytes[index + 1];
                if next.is_ascii_digit() || next == b'+' || next == b'-' {
                    index += 2;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    literal.split_at(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_decimal_numbers() {
        assert_eq!(parse_quantity("1"), Some(1.0));
        assert_eq!(parse_quantity("0.5"), Some(0.5));
        assert_eq!(parse_quantity("-2"), Some(-2.0));
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|actual| (actual - expected).abs() <= expected.abs() * 1e-12)
    }

    #[test]
    fn parses_si_suffixes() {
        assert!(close(parse_quantity("100m"), 0.1));
        assert!(close(parse_quantity("500n"), 5e-7));
        assert_eq!(parse_quantity("2k"), Some(2000.0));
        assert_eq!(parse_quantity("3G"), Some(3e9));
    }

    #[test]
    fn parses_binary_suffixes() {
        assert_eq!(parse_quantity("1Ki"), Some(1024.0));
        assert_eq!(parse_quantity("1Gi"), Some(1073741824.0));
    }

    #[test]
    fn parses_scientific_notation() {
        assert_eq!(parse_quantity("1e3"), Some(1000.0));
        assert_eq!(parse_quantity("2.5E-2"), Some(0.025));
    }

    #[test]
    fn exa_suffix_is_not_an_exponent() {
        assert_eq!(parse_quantity("1E"), Some(1e18));
    }

    #[test]
    fn formatting_variants_agree() {
        assert_eq!(parse_quantity("100m"), parse_quantity("0.1"));
        assert_eq!(parse_quantity("1000"), parse_quantity("1k"));
    }

    #[test]
    fn rejects_non_quantities() {
        assert_eq!(parse_quantity("Running"), None);
        assert_eq!(parse_quantity("1X"), None);
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("api-7d4f9"), None);
    }
}
