//! `Schema` (spec §4.4): maps field names to `FieldConfig`s (explicit or
//! pattern-derived), and turns a JSON document into a `Document` or a JSON
//! query fragment into a `backend::Query`.

pub mod document;
pub mod field;
pub mod pattern;

use crate::backend::Query;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::document::Document;
use crate::schema::field::{record_presence, FieldConfig};
use crate::schema::pattern::PatternConfig;
use crate::taxonomy::CategoryHierarchy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub fields: BTreeMap<String, FieldConfig>,
    pub patterns: Vec<PatternConfig>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Look up a field's config, falling back to pattern auto-configuration
    /// (which does NOT persist the result - callers that need it to stick
    /// should call `set_field` with the returned config).
    pub fn config_for(&self, field_name: &str) -> Option<FieldConfig> {
        self.fields
            .get(field_name)
            .cloned()
            .or_else(|| pattern::auto_configure(&self.patterns, field_name))
    }

    pub fn set_field(&mut self, field_name: impl Into<String>, config: FieldConfig) {
        self.fields.insert(field_name.into(), config);
    }

    /// Merge `field_name`'s config from `other` into `self`. If both define
    /// the field, the configs must be byte-identical or this errors (spec
    /// §4.4's schema-merge semantics: explicit fields never silently
    /// change shape out from under documents already indexed with them).
    pub fn merge_from(&mut self, other: &Schema) -> Result<()> {
        for (name, config) in &other.fields {
            match self.fields.get(name) {
                Some(existing) if existing == config => {}
                Some(existing) => {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!(
                            "field {name:?} configured as {existing:?} cannot be merged with incompatible {config:?}"
                        ),
                    ))
                }
                None => {
                    self.fields.insert(name.clone(), config.clone());
                }
            }
        }
        if !other.patterns.is_empty() {
            self.patterns = other.patterns.clone();
        }
        Ok(())
    }

    /// Index a whole JSON document (an object of field name -> value or
    /// array-of-values) for `doctype`, auto-configuring and persisting any
    /// unknown field whose name matches a pattern.
    pub fn process(
        &mut self,
        doctype: &str,
        value: &Value,
        taxonomies: &BTreeMap<String, CategoryHierarchy>,
    ) -> Result<Document> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "document must be a JSON object"))?;

        let mut doc = Document::new();
        let mut presence = field::PresenceMap::new();

        for (field_name, raw_value) in object {
            let config = match self.config_for(field_name) {
                Some(config) => {
                    if !self.fields.contains_key(field_name) {
                        self.set_field(field_name.clone(), config.clone());
                    }
                    config
                }
                None => {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!("field {field_name:?} has no config and matches no auto-configure pattern"),
                    ))
                }
            };
            if let FieldConfig::Meta(_) = &config {
                return Err(Error::new(
                    ErrorKind::InvalidValue,
                    format!("field {field_name:?} is configured as the meta field and cannot be assigned directly"),
                ));
            }
            let values = match raw_value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            let result = config.index(&mut doc, doctype, field_name, &values, taxonomies);
            record_presence(&mut presence, field_name, &values, result.is_err());
            result?;
        }

        let meta_config = self.fields.values().find_map(|c| match c {
            FieldConfig::Meta(m) => Some(m.clone()),
            _ => None,
        });
        if let Some(meta) = meta_config {
            field::index_meta(&mut doc, &meta, &presence);
        }

        Ok(doc)
    }

    /// Resolve `field_name` to the value slot a facet-count spy should read
    /// (spec §4.7). Only `date`/`timestamp` fields carry a slot; any other
    /// field - including an unconfigured one - yields `None`, and the spy
    /// is still installed but sees no documents.
    pub fn slot_for_field(&self, field_name: &str) -> Option<u32> {
        match self.config_for(field_name)? {
            FieldConfig::Date(cfg) => Some(cfg.slot),
            FieldConfig::Timestamp(cfg) => Some(cfg.slot),
            _ => None,
        }
    }

    /// Build the `backend::Query` fragment for `{field_name: {qtype: params}}`.
    /// An unknown field name produces `matchnothing` (spec §4.6). `doctype`
    /// is threaded down to the `id` field, whose term embeds the document
    /// type (see `FieldConfig::query`).
    pub fn build_field_query(&self, doctype: &str, field_name: &str, qtype: &str, params: &Value) -> Result<Query> {
        match self.config_for(field_name) {
            Some(FieldConfig::Meta(meta)) => {
                let known: Vec<String> = self.fields.keys().cloned().collect();
                field::build_meta_query(&meta, qtype, params, Some(&known))
            }
            Some(config) => config.query(doctype, qtype, params),
            None => Ok(Query::MatchNothing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{ExactFieldConfig, IdFieldConfig, MaxLen};
    use serde_json::json;

    fn schema_with_id_and_tag() -> Schema {
        let mut schema = Schema::new();
        schema.set_field("id", FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() }));
        schema.set_field(
            "tag",
            FieldConfig::Exact(ExactFieldConfig {
                prefix: "XTAG".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        );
        schema
    }

    #[test]
    fn process_indexes_known_fields() {
        let mut schema = schema_with_id_and_tag();
        let doc = schema
            .process("blog", &json!({"id": "1", "tag": "rust"}), &BTreeMap::new())
            .unwrap();
        assert_eq!(doc.idterm.as_deref(), Some("\tblog\t1"));
        assert!(doc.terms.contains_key("XTAG\trust"));
    }

    #[test]
    fn process_rejects_unconfigured_field_without_pattern() {
        let mut schema = schema_with_id_and_tag();
        let result = schema.process("blog", &json!({"unknown_field": "x"}), &BTreeMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn process_auto_configures_and_persists_pattern_match() {
        let mut schema = schema_with_id_and_tag();
        schema.patterns.push(PatternConfig {
            pattern: "*_exact".into(),
            config: FieldConfig::Exact(ExactFieldConfig {
                prefix: "*".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        });
        assert!(!schema.fields.contains_key("color_exact"));
        schema.process("blog", &json!({"color_exact": "red"}), &BTreeMap::new()).unwrap();
        assert!(schema.fields.contains_key("color_exact"));
    }

    #[test]
    fn merge_from_rejects_incompatible_redefinition() {
        let mut schema = schema_with_id_and_tag();
        let mut other = Schema::new();
        other.set_field(
            "tag",
            FieldConfig::Exact(ExactFieldConfig {
                prefix: "DIFFERENT".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        );
        assert!(schema.merge_from(&other).is_err());
    }

    #[test]
    fn merge_from_accepts_identical_redefinition() {
        let mut schema = schema_with_id_and_tag();
        let other = schema.clone();
        assert!(schema.merge_from(&other).is_ok());
    }

    #[test]
    fn merge_from_replaces_patterns_wholesale_rather_than_unioning() {
        let mut schema = schema_with_id_and_tag();
        schema.patterns.push(PatternConfig {
            pattern: "*_old".into(),
            config: FieldConfig::Ignore(crate::schema::field::IgnoreFieldConfig {}),
        });

        let mut other = Schema::new();
        other.patterns.push(PatternConfig {
            pattern: "*_new".into(),
            config: FieldConfig::Ignore(crate::schema::field::IgnoreFieldConfig {}),
        });

        schema.merge_from(&other).unwrap();
        assert_eq!(schema.patterns, other.patterns);
    }

    #[test]
    fn merge_from_with_no_patterns_leaves_existing_patterns_untouched() {
        let mut schema = schema_with_id_and_tag();
        schema.patterns.push(PatternConfig {
            pattern: "*_old".into(),
            config: FieldConfig::Ignore(crate::schema::field::IgnoreFieldConfig {}),
        });
        let original_patterns = schema.patterns.clone();

        let other = Schema::new();
        schema.merge_from(&other).unwrap();
        assert_eq!(schema.patterns, original_patterns);
    }

    #[test]
    fn build_field_query_on_unknown_field_is_matchnothing() {
        let schema = schema_with_id_and_tag();
        let query = schema.build_field_query("blog", "nope", "is", &json!("x")).unwrap();
        assert_eq!(query, Query::MatchNothing);
    }

    #[test]
    fn process_rejects_direct_assignment_to_the_meta_field() {
        let mut schema = schema_with_id_and_tag();
        schema.set_field("present", FieldConfig::Meta(crate::schema::field::MetaFieldConfig { prefix: "\t".into() }));
        let result = schema.process("blog", &json!({"present": "x"}), &BTreeMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn process_still_runs_meta_indexer_when_not_directly_assigned() {
        let mut schema = schema_with_id_and_tag();
        schema.set_field("present", FieldConfig::Meta(crate::schema::field::MetaFieldConfig { prefix: "\t".into() }));
        let doc = schema.process("blog", &json!({"id": "1", "tag": "rust"}), &BTreeMap::new()).unwrap();
        assert!(doc.terms.contains_key("\tFtag"));
        assert!(doc.terms.contains_key("\tNtag"));
    }

    #[test]
    fn slot_for_field_resolves_date_but_not_exact() {
        let mut schema = schema_with_id_and_tag();
        schema.set_field(
            "published",
            FieldConfig::Date(crate::schema::field::DateFieldConfig { slot: 7, store_field: None }),
        );
        assert_eq!(schema.slot_for_field("published"), Some(7));
        assert_eq!(schema.slot_for_field("tag"), None);
        assert_eq!(schema.slot_for_field("nope"), None);
    }
}
