//! Pattern-based auto-configuration of unknown field names (spec §4.4).

use crate::schema::field::FieldConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `pattern` is either a literal field name or `"*suffix"`. On first use of
/// an unknown field name, patterns are scanned in order; the first match
/// supplies a field config template, with any `*` inside its string values
/// substituted with the matched prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternConfig {
    pub pattern: String,
    pub config: FieldConfig,
}

impl PatternConfig {
    /// If `field_name` matches this pattern, return the matched prefix
    /// (empty string for a literal match).
    fn matched_prefix<'a>(&self, field_name: &'a str) -> Option<&'a str> {
        if let Some(suffix) = self.pattern.strip_prefix('*') {
            field_name.strip_suffix(suffix).filter(|_| field_name.ends_with(suffix))
        } else if self.pattern == field_name {
            Some("")
        } else {
            None
        }
    }

    /// Instantiate a config for `field_name`, substituting `*` in string
    /// template values with the matched prefix.
    pub fn instantiate(&self, field_name: &str) -> Option<FieldConfig> {
        let prefix = self.matched_prefix(field_name)?;
        let mut json = serde_json::to_value(&self.config).ok()?;
        substitute_stars(&mut json, prefix);
        serde_json::from_value(json).ok()
    }
}

fn substitute_stars(value: &mut Value, prefix: &str) {
    match value {
        Value::String(s) => {
            if s.contains('*') {
                *s = s.replace('*', prefix);
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_stars(item, prefix);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_stars(v, prefix);
            }
        }
        _ => {}
    }
}

/// Scan `patterns` in order, returning the first template that matches
/// `field_name`.
pub fn auto_configure(patterns: &[PatternConfig], field_name: &str) -> Option<FieldConfig> {
    patterns.iter().find_map(|p| p.instantiate(field_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{ExactFieldConfig, MaxLen, TooLongAction};

    fn exact_template(prefix: &str) -> FieldConfig {
        FieldConfig::Exact(ExactFieldConfig {
            prefix: prefix.to_string(),
            store_field: None,
            wdfinc: 0,
            max_len: MaxLen { max_length: 240, too_long_action: TooLongAction::Error },
        })
    }

    #[test]
    fn literal_pattern_matches_exactly() {
        let patterns = vec![PatternConfig { pattern: "tag".into(), config: exact_template("t") }];
        assert!(auto_configure(&patterns, "tag").is_some());
        assert!(auto_configure(&patterns, "tags").is_none());
    }

    #[test]
    fn wildcard_pattern_substitutes_prefix() {
        let patterns =
            vec![PatternConfig { pattern: "*_exact".into(), config: exact_template("*") }];
        let cfg = auto_configure(&patterns, "color_exact").unwrap();
        match cfg {
            FieldConfig::Exact(e) => assert_eq!(e.prefix, "color"),
            _ => panic!("expected exact config"),
        }
        assert!(auto_configure(&patterns, "color").is_none());
    }

    #[test]
    fn first_match_wins() {
        let patterns = vec![
            PatternConfig { pattern: "*_exact".into(), config: exact_template("first-*") },
            PatternConfig { pattern: "*".into(), config: exact_template("second-*") },
        ];
        let cfg = auto_configure(&patterns, "color_exact").unwrap();
        match cfg {
            FieldConfig::Exact(e) => assert_eq!(e.prefix, "first-color"),
            _ => panic!("expected exact config"),
        }
    }
}
