//! Field configurations (spec §4.4): per-field indexing and query-building
//! contracts.

use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::{cjk, StandardTokenizer, TokenFilter, Tokenizer};
use crate::backend::Query;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::document::Document;
use crate::taxonomy::CategoryHierarchy;
use chrono::NaiveDate;
use rust_stemmers::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_MAX_LENGTH: u32 = 240;
pub const MIN_MAX_LENGTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooLongAction {
    Error,
    Hash,
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxLen {
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default)]
    pub too_long_action: TooLongAction,
}

fn default_max_length() -> u32 {
    DEFAULT_MAX_LENGTH
}

impl Default for TooLongAction {
    fn default() -> Self {
        TooLongAction::Error
    }
}

impl Default for MaxLen {
    fn default() -> Self {
        MaxLen { max_length: DEFAULT_MAX_LENGTH, too_long_action: TooLongAction::Error }
    }
}

impl MaxLen {
    pub fn new(max_length: u32, too_long_action: TooLongAction) -> Self {
        MaxLen { max_length: max_length.max(MIN_MAX_LENGTH), too_long_action }
    }

    /// Apply the configured too-long policy to `value`, returning the term
    /// text that should actually be indexed.
    fn apply(&self, value: &str) -> Result<String> {
        if value.len() <= self.max_length as usize {
            return Ok(value.to_string());
        }
        match self.too_long_action {
            TooLongAction::Error => Err(Error::new(
                ErrorKind::InvalidValue,
                format!("value exceeds max length {} and too_long_action is error", self.max_length),
            )),
            TooLongAction::Truncate => {
                let mut end = self.max_length as usize;
                while end > 0 && !value.is_char_boundary(end) {
                    end -= 1;
                }
                Ok(value[..end].to_string())
            }
            TooLongAction::Hash => Ok(hash_long_term(value, self.max_length as usize)),
        }
    }
}

/// Deterministically shorten `value` to `max_length` bytes by keeping a
/// prefix and appending a hash of the full value, so distinct long values
/// very rarely collide.
fn hash_long_term(value: &str, max_length: usize) -> String {
    let mut hash: u64 = 1469598103934665603; // FNV offset basis
    for b in value.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(1099511628211); // FNV prime
    }
    let suffix = format!("#{hash:016x}");
    let keep = max_length.saturating_sub(suffix.len());
    let mut end = keep.min(value.len());
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &value[..end], suffix)
}

/// Normalize an `id`/`exact`/`cat` value to its string term form. Both
/// strings and non-negative integers are accepted and compare equal
/// (spec's Open Question resolution: numeric/string equivalence extends to
/// `exact.is` as well as `id`). Negative numbers are rejected (spec §8
/// Indexing scenario 1: `{id: -1}` must fail with `InvalidValue`).
pub fn normalize_exact_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => match n.as_u64() {
            Some(i) => Ok(i.to_string()),
            None => Err(Error::new(ErrorKind::InvalidValue, "exact-valued field requires a non-negative integer")),
        },
        _ => Err(Error::new(ErrorKind::InvalidValue, "exact-valued field requires a string or integer")),
    }
}

fn as_value_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Attributes every field config exposes to `Schema`, independent of its
/// kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdFieldConfig {
    pub store_field: Option<String>,
    #[serde(flatten)]
    pub max_len: MaxLen,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExactFieldConfig {
    pub prefix: String,
    pub store_field: Option<String>,
    #[serde(default)]
    pub wdfinc: u32,
    #[serde(flatten)]
    pub max_len: MaxLen,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextFieldConfig {
    pub prefix: String,
    pub store_field: Option<String>,
    /// "" for unstemmed, "cjk" for the CJK tokenizer, or "stem_<lang>".
    #[serde(default)]
    pub processor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateFieldConfig {
    pub slot: u32,
    pub store_field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimestampFieldConfig {
    pub slot: u32,
    pub store_field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryFieldConfig {
    pub prefix: String,
    pub taxonomy: String,
    pub store_field: Option<String>,
    #[serde(flatten)]
    pub max_len: MaxLen,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredFieldConfig {
    pub store_field: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IgnoreFieldConfig {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaFieldConfig {
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldConfig {
    Id(IdFieldConfig),
    Exact(ExactFieldConfig),
    Text(TextFieldConfig),
    Date(DateFieldConfig),
    Timestamp(TimestampFieldConfig),
    Cat(CategoryFieldConfig),
    Stored(StoredFieldConfig),
    Ignore(IgnoreFieldConfig),
    Meta(MetaFieldConfig),
}

/// Presence facts accumulated while indexing a document, consumed by the
/// `meta` field indexer at the end of `Schema::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Presence {
    pub nonempty: bool,
    pub errored: bool,
}

pub type PresenceMap = BTreeMap<String, Presence>;

fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

impl FieldConfig {
    pub fn store_field(&self) -> Option<&str> {
        match self {
            FieldConfig::Id(c) => c.store_field.as_deref(),
            FieldConfig::Exact(c) => c.store_field.as_deref(),
            FieldConfig::Text(c) => c.store_field.as_deref(),
            FieldConfig::Date(c) => c.store_field.as_deref(),
            FieldConfig::Timestamp(c) => c.store_field.as_deref(),
            FieldConfig::Cat(c) => c.store_field.as_deref(),
            FieldConfig::Stored(c) => c.store_field.as_deref(),
            FieldConfig::Ignore(_) => None,
            FieldConfig::Meta(_) => None,
        }
    }

    /// Index `raw_value` (already wrapped in an array by the caller if it
    /// wasn't one already) for `field_name` under document type `doctype`.
    pub fn index(
        &self,
        doc: &mut Document,
        doctype: &str,
        field_name: &str,
        values: &[Value],
        taxonomies: &BTreeMap<String, CategoryHierarchy>,
    ) -> Result<()> {
        match self {
            FieldConfig::Id(cfg) => {
                if values.len() != 1 {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!("id field {field_name} must have exactly one value"),
                    ));
                }
                let raw = normalize_exact_value(&values[0])?;
                let term_value = cfg.max_len.apply(&raw)?;
                let idterm = format!("\t{doctype}\t{term_value}");
                doc.add_term(idterm.clone(), 1, None);
                doc.idterm = Some(idterm);
                if let Some(store) = &cfg.store_field {
                    doc.data.set(store.clone(), values[0].clone());
                }
                Ok(())
            }
            FieldConfig::Exact(cfg) => {
                for v in values {
                    let raw = normalize_exact_value(v)?;
                    let term_value = cfg.max_len.apply(&raw)?;
                    doc.add_term(format!("{}\t{}", cfg.prefix, term_value), cfg.wdfinc.max(1), None);
                }
                if let Some(store) = &cfg.store_field {
                    doc.data.set(store.clone(), Value::Array(values.to_vec()));
                }
                Ok(())
            }
            FieldConfig::Text(cfg) => {
                index_text(doc, cfg, values)?;
                if let Some(store) = &cfg.store_field {
                    doc.data.set(store.clone(), Value::Array(values.to_vec()));
                }
                Ok(())
            }
            FieldConfig::Date(cfg) => {
                for v in values {
                    let s = v.as_str().ok_or_else(|| {
                        Error::new(ErrorKind::InvalidValue, "date field requires a string value")
                    })?;
                    let date = parse_date(s)?;
                    doc.add_value(cfg.slot, date_sort_key(date).to_vec());
                }
                if let Some(store) = &cfg.store_field {
                    doc.data.set(store.clone(), Value::Array(values.to_vec()));
                }
                Ok(())
            }
            FieldConfig::Timestamp(cfg) => {
                for v in values {
                    let n = v.as_u64().ok_or_else(|| {
                        Error::new(ErrorKind::InvalidValue, "timestamp field requires a non-negative integer")
                    })?;
                    doc.add_value(cfg.slot, n.to_be_bytes().to_vec());
                }
                if let Some(store) = &cfg.store_field {
                    doc.data.set(store.clone(), Value::Array(values.to_vec()));
                }
                Ok(())
            }
            FieldConfig::Cat(cfg) => {
                let hierarchy = taxonomies.get(&cfg.taxonomy).ok_or_else(|| {
                    Error::new(ErrorKind::NotFound, format!("unknown taxonomy {}", cfg.taxonomy))
                })?;
                for v in values {
                    let cat_id = v.as_str().ok_or_else(|| {
                        Error::new(ErrorKind::InvalidValue, "cat field requires a string value")
                    })?;
                    let cat_id = cfg.max_len.apply(cat_id)?;
                    doc.add_term(format!("{}\tC{}", cfg.prefix, cat_id), 0, None);
                    if let Some(cat) = hierarchy.find(&cat_id) {
                        for ancestor in &cat.ancestors {
                            doc.add_term(format!("{}\tA{}", cfg.prefix, ancestor), 0, None);
                        }
                    }
                    doc.add_term(format!("{}\tA{}", cfg.prefix, cat_id), 0, None);
                }
                if let Some(store) = &cfg.store_field {
                    doc.data.set(store.clone(), Value::Array(values.to_vec()));
                }
                Ok(())
            }
            FieldConfig::Stored(cfg) => {
                let stored_name = cfg.store_field.clone().unwrap_or_else(|| field_name.to_string());
                doc.data.set(stored_name, Value::Array(values.to_vec()));
                Ok(())
            }
            FieldConfig::Ignore(_) => Ok(()),
            FieldConfig::Meta(_) => Ok(()),
        }
    }

    /// Build the query fragment for `qtype` applied to this field. `doctype`
    /// is needed only by the `id` field, whose term is the same
    /// `"\t{doctype}\t{value}"` idterm written at index time (an `id` has no
    /// prefix of its own the way `exact` fields do).
    pub fn query(&self, doctype: &str, qtype: &str, params: &Value) -> Result<Query> {
        match self {
            FieldConfig::Id(_) | FieldConfig::Exact(_) => match qtype {
                "is" => {
                    let values = as_value_list(params);
                    let prefix = match self {
                        FieldConfig::Exact(c) => format!("{}\t", c.prefix),
                        _ => format!("\t{doctype}\t"),
                    };
                    let terms = values
                        .iter()
                        .map(|v| normalize_exact_value(v).map(|s| Query::Term(format!("{prefix}{s}"))))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Query::Or(terms))
                }
                _ => Err(unsupported_qtype(qtype)),
            },
            FieldConfig::Cat(cfg) => match qtype {
                "is" => build_cat_query(cfg, params, "C"),
                "ancestor_is" => build_cat_query(cfg, params, "A"),
                _ => Err(unsupported_qtype(qtype)),
            },
            FieldConfig::Text(cfg) => match qtype {
                "text" | "parse" => build_text_query(cfg, qtype, params),
                _ => Err(unsupported_qtype(qtype)),
            },
            FieldConfig::Date(cfg) => match qtype {
                "range" => build_date_range_query(cfg.slot, params),
                _ => Err(unsupported_qtype(qtype)),
            },
            FieldConfig::Timestamp(cfg) => match qtype {
                "range" => build_timestamp_range_query(cfg.slot, params),
                _ => Err(unsupported_qtype(qtype)),
            },
            FieldConfig::Meta(cfg) => build_meta_query(cfg, qtype, params, None),
            FieldConfig::Stored(_) | FieldConfig::Ignore(_) => {
                Err(Error::new(ErrorKind::InvalidValue, "stored/ignore fields are not queryable"))
            }
        }
    }
}

fn unsupported_qtype(qtype: &str) -> Error {
    Error::new(ErrorKind::InvalidValue, format!("unsupported query type {qtype:?} for this field"))
}

fn build_cat_query(cfg: &CategoryFieldConfig, params: &Value, flag: &str) -> Result<Query> {
    let values = as_value_list(params);
    let terms = values
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "cat query value must be a string"))
                .map(|s| Query::Term(format!("{}\t{}{}", cfg.prefix, flag, s)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Query::Or(terms))
}

/// `meta` field's query: `params` is either `null` ("any field", OR over
/// every known field name) or a field name string.
pub fn build_meta_query(
    cfg: &MetaFieldConfig,
    qtype: &str,
    params: &Value,
    known_fields: Option<&[String]>,
) -> Result<Query> {
    let flag = match qtype {
        "exists" => "F",
        "nonempty" => "N",
        "empty" => "M",
        "error" => "E",
        _ => return Err(unsupported_qtype(qtype)),
    };
    match params {
        Value::Null => {
            let fields = known_fields.unwrap_or(&[]);
            if fields.is_empty() {
                return Ok(Query::MatchNothing);
            }
            Ok(Query::Or(
                fields.iter().map(|f| Query::Term(format!("{}{flag}{f}", cfg.prefix))).collect(),
            ))
        }
        Value::String(field) => Ok(Query::Term(format!("{}{flag}{field}", cfg.prefix))),
        _ => Err(Error::new(ErrorKind::InvalidValue, "meta query params must be null or a field name string")),
    }
}

/// Run the `meta` indexer: called once per document with the presence map
/// accumulated while indexing the other fields.
pub fn index_meta(doc: &mut Document, cfg: &MetaFieldConfig, presence: &PresenceMap) {
    for (field, state) in presence {
        doc.add_term(format!("{}F{}", cfg.prefix, field), 0, None);
        if state.errored {
            doc.add_term(format!("{}E{}", cfg.prefix, field), 0, None);
        } else if state.nonempty {
            doc.add_term(format!("{}N{}", cfg.prefix, field), 0, None);
        } else {
            doc.add_term(format!("{}M{}", cfg.prefix, field), 0, None);
        }
    }
}

pub fn record_presence(presence: &mut PresenceMap, field_name: &str, values: &[Value], errored: bool) {
    let nonempty = !errored && values.iter().any(|v| !value_is_empty(v));
    presence.insert(field_name.to_string(), Presence { nonempty, errored });
}

fn index_text(doc: &mut Document, cfg: &TextFieldConfig, values: &[Value]) -> Result<()> {
    let stemmer_algorithm = stemmer_for_processor(&cfg.processor)?;
    for v in values {
        let text = v
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "text field requires a string value"))?;
        if cfg.processor == "cjk" {
            for token in cjk::tokenize(text) {
                doc.add_term(format!("{}{}", cfg.prefix, token.text), 1, Some(token.position));
            }
        } else {
            let tokenizer = StandardTokenizer::default();
            let lowercase = LowercaseFilter;
            let mut tokens = tokenizer.tokenize(text);
            tokens = lowercase.filter(tokens);
            for token in &tokens {
                doc.add_term(format!("{}{}", cfg.prefix, token.text), 1, Some(token.position));
            }
            if let Some(algorithm) = stemmer_algorithm {
                let stemmer = StemmerFilter::new(algorithm);
                let stemmed = stemmer.filter(tokens);
                for token in stemmed {
                    doc.add_term(format!("Z{}{}", cfg.prefix, token.text), 1, None);
                }
            }
        }
    }
    Ok(())
}

fn stemmer_for_processor(processor: &str) -> Result<Option<Algorithm>> {
    if processor.is_empty() || processor == "cjk" {
        return Ok(None);
    }
    let Some(lang) = processor.strip_prefix("stem_") else {
        return Err(Error::new(
            ErrorKind::InvalidValue,
            format!("unrecognised text processor {processor:?}, expected \"\", \"cjk\" or \"stem_<lang>\""),
        ));
    };
    let algorithm = match lang {
        "en" | "english" => Algorithm::English,
        "fr" | "french" => Algorithm::French,
        "de" | "german" => Algorithm::German,
        "es" | "spanish" => Algorithm::Spanish,
        "it" | "italian" => Algorithm::Italian,
        "pt" | "portuguese" => Algorithm::Portuguese,
        "nl" | "dutch" => Algorithm::Dutch,
        "ru" | "russian" => Algorithm::Russian,
        other => {
            return Err(Error::new(ErrorKind::InvalidValue, format!("unsupported stemmer language {other:?}")))
        }
    };
    Ok(Some(algorithm))
}

fn build_text_query(cfg: &TextFieldConfig, qtype: &str, params: &Value) -> Result<Query> {
    let text = params
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "text query requires a \"text\" string"))?;
    let op = params.get("op").and_then(Value::as_str).unwrap_or("or");
    let tokenizer = StandardTokenizer::default();
    let lowercase = LowercaseFilter;
    let raw_tokens = if cfg.processor == "cjk" { cjk::tokenize(text) } else { lowercase.filter(tokenizer.tokenize(text)) };
    let terms: Vec<String> = raw_tokens.iter().map(|t| format!("{}{}", cfg.prefix, t.text)).collect();
    if terms.is_empty() {
        return Ok(Query::MatchNothing);
    }
    match (qtype, op) {
        (_, "and") => Ok(Query::And(terms.into_iter().map(Query::Term).collect())),
        (_, "or") => Ok(Query::Or(terms.into_iter().map(Query::Term).collect())),
        ("text", "phrase") => Ok(Query::Phrase(terms)),
        ("text", "near") => {
            let window = params.get("window").and_then(Value::as_u64).unwrap_or(terms.len() as u64 + 10);
            Ok(Query::Near(terms, window as u32))
        }
        _ => Err(Error::new(ErrorKind::InvalidValue, format!("unsupported text query op {op:?} for qtype {qtype:?}"))),
    }
}

/// Parse `YYYY-MM-DD`, year of arbitrary length, leading `-` for negative
/// years, extrapolated (proleptic) Gregorian calendar.
///
/// The year is represented with `i32` internally (chrono's native range),
/// which comfortably spans any date a real document will carry; a
/// genuinely unbounded-precision year is not representable here.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let bad = || Error::new(ErrorKind::InvalidValue, format!("invalid date {s:?}, expected YYYY-MM-DD"));
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s),
    };
    let parts: Vec<&str> = rest.split('-').collect();
    if parts.len() != 3 {
        return Err(bad());
    }
    let mut year: i32 = parts[0].parse().map_err(|_| bad())?;
    if negative {
        year = -year;
    }
    let month: u32 = parts[1].parse().map_err(|_| bad())?;
    let day: u32 = parts[2].parse().map_err(|_| bad())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)
}

/// Sortable 8-byte big-endian key for a date: bias the Julian day number
/// so the byte ordering matches chronological ordering across the whole
/// representable year range.
pub fn date_sort_key(date: NaiveDate) -> [u8; 8] {
    const BIAS: i64 = 10_000_000_000;
    let days = date.num_days_from_ce() as i64;
    let biased = (days + BIAS) as u64;
    biased.to_be_bytes()
}

fn build_date_range_query(slot: u32, params: &Value) -> Result<Query> {
    let bounds = params
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "date range query requires a 2-element array"))?;
    let lo = bounds[0].as_str().map(parse_date).transpose()?;
    let hi = bounds[1].as_str().map(parse_date).transpose()?;
    let lo_bytes = lo.map(|d| date_sort_key(d).to_vec()).unwrap_or_else(|| vec![0u8; 8]);
    let hi_bytes = hi.map(|d| date_sort_key(d).to_vec()).unwrap_or_else(|| vec![0xff; 8]);
    Ok(Query::ValueRange(slot, lo_bytes, hi_bytes))
}

fn build_timestamp_range_query(slot: u32, params: &Value) -> Result<Query> {
    let bounds = params
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "timestamp range query requires a 2-element array"))?;
    let lo = bounds[0].as_u64().unwrap_or(0);
    let hi = bounds[1].as_u64().unwrap_or(u64::MAX);
    Ok(Query::ValueRange(slot, lo.to_be_bytes().to_vec(), hi.to_be_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_long_error_action_rejects() {
        let max_len = MaxLen::new(MIN_MAX_LENGTH, TooLongAction::Error);
        assert!(max_len.apply(&"x".repeat(100)).is_err());
    }

    #[test]
    fn too_long_truncate_action_shortens() {
        let max_len = MaxLen::new(MIN_MAX_LENGTH, TooLongAction::Truncate);
        let out = max_len.apply(&"x".repeat(100)).unwrap();
        assert_eq!(out.len(), MIN_MAX_LENGTH as usize);
    }

    #[test]
    fn too_long_hash_action_is_deterministic() {
        let max_len = MaxLen::new(MIN_MAX_LENGTH, TooLongAction::Hash);
        let value = "y".repeat(100);
        let a = max_len.apply(&value).unwrap();
        let b = max_len.apply(&value).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= MIN_MAX_LENGTH as usize);
    }

    #[test]
    fn normalize_exact_value_accepts_string_and_int() {
        assert_eq!(normalize_exact_value(&Value::String("7".into())).unwrap(), "7");
        assert_eq!(normalize_exact_value(&serde_json::json!(7)).unwrap(), "7");
        assert_eq!(normalize_exact_value(&serde_json::json!(18446744073709551615u64)).unwrap(), "18446744073709551615");
    }

    #[test]
    fn normalize_exact_value_rejects_negative_numbers() {
        assert!(normalize_exact_value(&serde_json::json!(-1)).is_err());
    }

    #[test]
    fn id_field_rejects_negative_value() {
        let cfg = FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() });
        let mut doc = Document::new();
        assert!(cfg.index(&mut doc, "blog", "id", &[serde_json::json!(-1)], &BTreeMap::new()).is_err());
    }

    #[test]
    fn date_parses_negative_years() {
        let d = parse_date("-0044-03-15").unwrap();
        assert_eq!(d.year(), -44);
    }

    use chrono::Datelike;

    #[test]
    fn date_sort_key_is_monotonic() {
        let a = parse_date("2020-01-01").unwrap();
        let b = parse_date("2020-06-01").unwrap();
        assert!(date_sort_key(a) < date_sort_key(b));
    }

    #[test]
    fn id_field_indexes_single_idterm() {
        let cfg = FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() });
        let mut doc = Document::new();
        cfg.index(&mut doc, "blog", "id", &[Value::String("abc".into())], &BTreeMap::new()).unwrap();
        assert_eq!(doc.idterm.as_deref(), Some("\tblog\tabc"));
        assert!(doc.terms.contains_key("\tblog\tabc"));
    }

    #[test]
    fn id_is_query_matches_the_indexed_idterm() {
        let cfg = FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() });
        let mut doc = Document::new();
        cfg.index(&mut doc, "blog", "id", &[serde_json::json!(32)], &BTreeMap::new()).unwrap();
        let query = cfg.query("blog", "is", &serde_json::json!(["32"])).unwrap();
        match query {
            Query::Or(terms) => {
                assert_eq!(terms, vec![Query::Term(doc.idterm.clone().unwrap())]);
            }
            other => panic!("expected an OR of terms, got {other:?}"),
        }
    }

    #[test]
    fn cat_field_indexes_self_and_ancestors() {
        let mut taxonomies = BTreeMap::new();
        let mut hierarchy = CategoryHierarchy::new();
        let mut modified = Default::default();
        hierarchy.add_parent("dog", "mammal", &mut modified).unwrap();
        taxonomies.insert("animals".to_string(), hierarchy);

        let cfg = FieldConfig::Cat(CategoryFieldConfig {
            prefix: "XCAT".into(),
            taxonomy: "animals".into(),
            store_field: None,
            max_len: MaxLen::default(),
        });
        let mut doc = Document::new();
        cfg.index(&mut doc, "blog", "category", &[Value::String("dog".into())], &taxonomies).unwrap();
        assert!(doc.terms.contains_key("XCAT\tCdog"));
        assert!(doc.terms.contains_key("XCAT\tAdog"));
        assert!(doc.terms.contains_key("XCAT\tAmammal"));
    }

    #[test]
    fn meta_indexer_emits_presence_terms() {
        let cfg = MetaFieldConfig { prefix: "\t".into() };
        let mut presence = PresenceMap::new();
        record_presence(&mut presence, "title", &[Value::String("hi".into())], false);
        record_presence(&mut presence, "empty_field", &[], false);
        let mut doc = Document::new();
        index_meta(&mut doc, &cfg, &presence);
        assert!(doc.terms.contains_key("\tFtitle"));
        assert!(doc.terms.contains_key("\tNtitle"));
        assert!(doc.terms.contains_key("\tFempty_field"));
        assert!(doc.terms.contains_key("\tMempty_field"));
    }
}
