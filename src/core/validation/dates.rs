//! Business date formats
//!
//! Feed dates arrive as `ccyymmdd`, `ccyymm` or `ccyy`. A partial date is
//! treated as the first day of the period it names, so "not in the future"
//! means the period has started.

use chrono::NaiveDate;

/// Parse a business date into the first day of the period it names
///
/// Returns `None` for anything that is not 4, 6 or 8 ASCII digits forming a
/// real calendar date.
pub fn parse_business_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    match value.len() {
        8 => NaiveDate::parse_from_str(value, "%Y%m%d").ok(),
        6 => {
            let year = value[..4].parse().ok()?;
            let month = value[4..].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)
        }
        4 => NaiveDate::from_ymd_opt(value.parse().ok()?, 1, 1),
        _ => None,
    }
}

/// True when `value` is a valid business date whose period has started by `today`
pub fn is_valid_past_date(value: &str, today: NaiveDate) -> bool {
    parse_business_date(value).is_some_and(|date| date <= today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test_case("19700101", Some((1970, 1, 1)); "full date")]
    #[test_case("197002", Some((1970, 2, 1)); "year and month")]
    #[test_case("1970", Some((1970, 1, 1)); "year only")]
    #[test_case(" 19700101 ", Some((1970, 1, 1)); "surrounding whitespace")]
    #[test_case("19700230", None; "impossible day")]
    #[test_case("197013", None; "impossible month")]
    #[test_case("1970-01-01", None; "iso separators")]
    #[test_case("70", None; "two digit year")]
    #[test_case("", None; "empty")]
    fn test_parse_business_date(input: &str, expected: Option<(i32, u32, u32)>) {
        let expected = expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(parse_business_date(input), expected);
    }

    #[test_case("20240615", true; "today")]
    #[test_case("20240616", false; "tomorrow")]
    #[test_case("202406", true; "current month")]
    #[test_case("202407", false; "next month")]
    #[test_case("2024", true; "current year")]
    #[test_case("2025", false; "next year")]
    #[test_case("abcd", false; "not a date")]
    fn test_is_valid_past_date(input: &str, expected: bool) {
        assert_eq!(is_valid_past_date(input, today()), expected);
    }
}
