use super::{CellContext, Converter, flags};
use crate::error::{ConfigError, ParseError};

const DEFAULT_TRUE: &str = "true";
const DEFAULT_FALSE: &str = "false";

/// Reads and writes `bool` using a configurable literal pair.
///
/// The format is `"<true>|<false>"`, e.g. `"Y|N"` or `"yes|no"`. Matching is
/// case-insensitive unless [`flags::CASE_SENSITIVE`] is set. Text matching
/// neither literal reads as `false`, or as an error under [`flags::STRICT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolConverter;

#[derive(Debug, Clone)]
pub struct BoolConfig {
    true_literal: String,
    false_literal: String,
    case_sensitive: bool,
    strict: bool,
}

impl BoolConfig {
    fn matches(&self, text: &str, literal: &str) -> bool {
        if self.case_sensitive {
            text == literal
        } else {
            text.eq_ignore_ascii_case(literal)
        }
    }
}

impl Converter for BoolConverter {
    type Value = bool;
    type Config = BoolConfig;

    fn configure(&self, format: Option<&str>, flags: u32) -> Result<BoolConfig, ConfigError> {
        let case_sensitive = flags & flags::CASE_SENSITIVE != 0;
        let (true_literal, false_literal) = match format {
            None => (DEFAULT_TRUE, DEFAULT_FALSE),
            Some(pattern) => {
                let (yes, no) = pattern.split_once('|').ok_or_else(|| {
                    ConfigError::invalid_format(pattern, "expected '<true>|<false>'")
                })?;
                let (yes, no) = (yes.trim(), no.trim());
                if yes.is_empty() || no.is_empty() || no.contains('|') {
                    return Err(ConfigError::invalid_format(
                        pattern,
                        "both boolean literals must be present and non-empty",
                    ));
                }
                let same = if case_sensitive {
                    yes == no
                } else {
                    yes.eq_ignore_ascii_case(no)
                };
                if same {
                    return Err(ConfigError::invalid_format(
                        pattern,
                        "true and false literals must differ",
                    ));
                }
                (yes, no)
            }
        };
        Ok(BoolConfig {
            true_literal: true_literal.to_string(),
            false_literal: false_literal.to_string(),
            case_sensitive,
            strict: flags & flags::STRICT != 0,
        })
    }

    fn needs_quoting(&self, config: &BoolConfig) -> bool {
        [&config.true_literal, &config.false_literal]
            .iter()
            .any(|literal| literal.chars().any(|ch| !ch.is_alphanumeric()))
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, config: &BoolConfig, value: &bool) -> Option<String> {
        let literal = if *value {
            &config.true_literal
        } else {
            &config.false_literal
        };
        Some(literal.clone())
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &BoolConfig,
        error: &mut ParseError,
    ) -> Option<bool> {
        let text = cell.text;
        if text.is_empty() {
            return None;
        }
        if config.matches(text, &config.true_literal) {
            return Some(true);
        }
        if config.matches(text, &config.false_literal) || !config.strict {
            return Some(false);
        }
        cell.invalid(
            error,
            format!(
                "'{text}' is neither '{}' nor '{}'",
                config.true_literal, config.false_literal
            ),
        );
        None
    }
}
