//! Decimal formatting patterns such as `#,##0.00`, `0.###` or `$#,##0`.
//!
//! A pattern is `prefix integer-part [. fraction-part] suffix`:
//!
//! - the integer part uses `#` and `0`; `0` marks a mandatory digit and a
//!   `,` enables grouping, with the group size taken from the digits after the
//!   last comma;
//! - the fraction part is zero or more `0` (mandatory digits) followed by
//!   zero or more `#` (optional digits);
//! - prefix and suffix are copied literally.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;

static PATTERN_SYNTAX: OnceLock<Regex> = OnceLock::new();

fn pattern_syntax() -> &'static Regex {
    PATTERN_SYNTAX.get_or_init(|| {
        Regex::new(
            r"^(?P<prefix>[^#0-9,.]*)(?P<int>[#0,]+)(?:\.(?P<frac>[#0]*))?(?P<suffix>[^#0-9,.]*)$",
        )
        .expect("number pattern syntax is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberPattern {
    prefix: String,
    suffix: String,
    group_size: Option<usize>,
    min_integer_digits: usize,
    min_fraction_digits: usize,
    max_fraction_digits: usize,
}

impl NumberPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let captures = pattern_syntax()
            .captures(pattern)
            .ok_or_else(|| ConfigError::invalid_format(pattern, "not a number pattern"))?;
        let integer = &captures["int"];
        let fraction = captures.name("frac").map(|m| m.as_str()).unwrap_or("");

        if integer.starts_with(',') || integer.ends_with(',') || integer.contains(",,") {
            return Err(ConfigError::invalid_format(
                pattern,
                "grouping separators must sit between digit placeholders",
            ));
        }
        let digits = integer.replace(',', "");
        if digits.trim_start_matches('#').contains('#') {
            return Err(ConfigError::invalid_format(
                pattern,
                "'#' cannot follow '0' in the integer part",
            ));
        }
        if fraction.trim_start_matches('0').contains('0') {
            return Err(ConfigError::invalid_format(
                pattern,
                "'0' cannot follow '#' in the fraction part",
            ));
        }
        let group_size = integer
            .rfind(',')
            .map(|idx| integer.len() - idx - 1);

        Ok(Self {
            prefix: captures["prefix"].to_string(),
            suffix: captures["suffix"].to_string(),
            group_size,
            min_integer_digits: digits.chars().filter(|c| *c == '0').count(),
            min_fraction_digits: fraction.chars().filter(|c| *c == '0').count(),
            max_fraction_digits: fraction.len(),
        })
    }

    pub fn max_fraction_digits(&self) -> usize {
        self.max_fraction_digits
    }

    /// Whether rendered text can contain characters other than digits, the
    /// sign and the decimal point.
    pub fn may_need_quoting(&self) -> bool {
        self.group_size.is_some() || !self.prefix.is_empty() || !self.suffix.is_empty()
    }

    /// Renders canonical numeric text (`-1234.5` style, already rounded to at
    /// most [`Self::max_fraction_digits`]) through the pattern.
    pub fn render(&self, canonical: &str) -> String {
        let (negative, body) = match canonical.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, canonical),
        };
        let (integer, fraction) = body.split_once('.').unwrap_or((body, ""));

        let mut fraction = fraction.to_string();
        while fraction.len() > self.min_fraction_digits && fraction.ends_with('0') {
            fraction.pop();
        }
        while fraction.len() < self.min_fraction_digits {
            fraction.push('0');
        }

        let mut integer = integer.trim_start_matches('0').to_string();
        let floor = self.min_integer_digits.max(usize::from(fraction.is_empty()));
        while integer.len() < floor {
            integer.insert(0, '0');
        }
        if let Some(size) = self.group_size.filter(|size| *size > 0) {
            integer = group_digits(&integer, size);
        }

        let is_zero = !body.chars().any(|c| c.is_ascii_digit() && c != '0');
        let mut out = String::with_capacity(canonical.len() + self.prefix.len() + 4);
        if negative && !is_zero {
            out.push('-');
        }
        out.push_str(&self.prefix);
        out.push_str(&integer);
        if !fraction.is_empty() {
            out.push('.');
            out.push_str(&fraction);
        }
        out.push_str(&self.suffix);
        out
    }

    /// Strips affixes and grouping, returning canonical numeric text.
    pub fn normalize(&self, text: &str) -> Result<String, String> {
        let mut rest = text;
        let mut negative = false;
        if let Some(stripped) = rest.strip_prefix('-') {
            negative = true;
            rest = stripped;
        }
        if !self.prefix.is_empty() {
            rest = rest
                .strip_prefix(self.prefix.as_str())
                .ok_or_else(|| format!("'{text}' does not start with '{}'", self.prefix))?;
        }
        if !negative && let Some(stripped) = rest.strip_prefix('-') {
            negative = true;
            rest = stripped;
        }
        if !self.suffix.is_empty() {
            rest = rest
                .strip_suffix(self.suffix.as_str())
                .ok_or_else(|| format!("'{text}' does not end with '{}'", self.suffix))?;
        }

        let (integer, fraction) = rest.split_once('.').unwrap_or((rest, ""));
        let integer = if self.group_size.is_some() {
            integer.replace(',', "")
        } else {
            integer.to_string()
        };
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(&integer) || !all_digits(fraction)
        {
            return Err(format!("'{text}' does not match the number pattern"));
        }

        let mut canonical = String::with_capacity(integer.len() + fraction.len() + 2);
        if negative {
            canonical.push('-');
        }
        if integer.is_empty() {
            canonical.push('0');
        } else {
            canonical.push_str(&integer);
        }
        if !fraction.is_empty() {
            canonical.push('.');
            canonical.push_str(fraction);
        }
        Ok(canonical)
    }
}

fn group_digits(digits: &str, size: usize) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / size);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % size == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grouping_and_fraction_digits() {
        let pattern = NumberPattern::parse("#,##0.00#").unwrap();
        assert_eq!(pattern.group_size, Some(3));
        assert_eq!(pattern.min_integer_digits, 1);
        assert_eq!(pattern.min_fraction_digits, 2);
        assert_eq!(pattern.max_fraction_digits, 3);
        assert!(pattern.may_need_quoting());
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in ["", "abc", "#,##0.0.0", "0#", "#.#0", ",##0", "##0,", "#,,##0"] {
            assert!(NumberPattern::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn renders_with_grouping_and_affixes() {
        let pattern = NumberPattern::parse("$#,##0.00").unwrap();
        assert_eq!(pattern.render("1234567.5"), "$1,234,567.50");
        assert_eq!(pattern.render("-12.00"), "-$12.00");
        assert_eq!(pattern.render("0"), "$0.00");
        assert_eq!(pattern.render("-0.00"), "$0.00");
    }

    #[test]
    fn renders_optional_fraction_digits() {
        let pattern = NumberPattern::parse("0.###").unwrap();
        assert_eq!(pattern.render("3.500"), "3.5");
        assert_eq!(pattern.render("3.000"), "3");
        assert_eq!(pattern.render("0.250"), "0.25");

        let padded = NumberPattern::parse("000").unwrap();
        assert_eq!(padded.render("7"), "007");
    }

    #[test]
    fn normalizes_rendered_text() {
        let pattern = NumberPattern::parse("$#,##0.00 USD").unwrap();
        assert_eq!(pattern.normalize("$1,234.50 USD").unwrap(), "1234.50");
        assert_eq!(pattern.normalize("-$1,234.50 USD").unwrap(), "-1234.50");
        assert_eq!(pattern.normalize("$-3 USD").unwrap(), "-3");
        assert!(pattern.normalize("1,234.50").is_err());
        assert!(pattern.normalize("$12a USD").is_err());
    }

    #[test]
    fn grouping_is_only_accepted_when_configured() {
        let plain = NumberPattern::parse("0.00").unwrap();
        assert!(plain.normalize("1,000.00").is_err());
        assert!(!plain.may_need_quoting());
    }
}
