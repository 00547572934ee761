//! Search request/response types and execution (spec §4.6 "Search
//! execution").

use crate::backend::{IndexBackend, MatchSpy, SearchOutcome};
use crate::core::error::Result;
use crate::schema::document::DocumentData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `-1` in `size`/`checkatleast` means "all documents"; represented here as
/// `None` after normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Value,
    pub from: usize,
    pub size: Option<usize>,
    pub checkatleast: Option<usize>,
    pub display: Option<Vec<String>>,
    pub verbose: bool,
    /// Raw `{type, field, doc_limit, result_limit}` match-spy specs (spec
    /// §4.7); resolved against a schema by the caller that builds spies.
    pub info: Vec<Value>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            query: Value::Null,
            from: 0,
            size: Some(10),
            checkatleast: Some(0),
            display: None,
            verbose: false,
            info: Vec::new(),
        }
    }
}

impl SearchRequest {
    /// Parse a `{query, from, size, checkatleast, info, display, verbose}`
    /// request body, applying the documented defaults.
    pub fn from_json(value: &Value) -> Self {
        let from = value.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = match value.get("size").and_then(Value::as_i64) {
            Some(-1) => None,
            Some(n) if n >= 0 => Some(n as usize),
            _ => Some(10),
        };
        let checkatleast = match value.get("checkatleast").and_then(Value::as_i64) {
            Some(-1) => None,
            Some(n) if n >= 0 => Some(n as usize),
            _ => Some(0),
        };
        let display = value.get("display").and_then(Value::as_array).map(|items| {
            items.iter().filter_map(Value::as_str).map(str::to_string).collect()
        });
        let verbose = value.get("verbose").and_then(Value::as_bool).unwrap_or(false);
        let info = value.get("info").and_then(Value::as_array).cloned().unwrap_or_default();
        SearchRequest { query: value.get("query").cloned().unwrap_or(Value::Null), from, size, checkatleast, display, verbose, info }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub from: usize,
    pub size: i64,
    pub checkatleast: i64,
    pub matches_lower_bound: u64,
    pub matches_estimated: u64,
    pub matches_upper_bound: u64,
    pub items: Vec<BTreeMap<String, Value>>,
    pub info: Vec<Value>,
}

/// Execute `request` against `backend`, selecting `display` fields (or
/// every stored field when absent) for each hit.
pub fn execute(
    backend: &dyn IndexBackend,
    outcome_query: &crate::backend::Query,
    request: &SearchRequest,
    spies: &mut [(&str, &mut dyn MatchSpy)],
) -> Result<SearchResponse> {
    let size = request.size.unwrap_or(usize::MAX);
    let check_at_least = request.checkatleast.unwrap_or(usize::MAX);
    let mut borrowed: Vec<&mut dyn MatchSpy> = spies.iter_mut().map(|(_, spy)| &mut **spy).collect();
    let SearchOutcome { hits, matches_lower_bound, matches_estimated, matches_upper_bound } =
        backend.search(outcome_query, request.from, size, check_at_least, &mut borrowed)?;

    let items = hits
        .iter()
        .filter_map(|hit| {
            let bytes = backend.get_document_data(hit.doc_id)?;
            let data = DocumentData::deserialize(bytes).ok()?;
            Some(select_display_fields(&data, request.display.as_deref()))
        })
        .collect();

    let info = spies.iter().map(|(_, spy)| spy.to_json()).collect();

    Ok(SearchResponse {
        from: request.from,
        size: request.size.map(|s| s as i64).unwrap_or(-1),
        checkatleast: request.checkatleast.map(|c| c as i64).unwrap_or(-1),
        matches_lower_bound,
        matches_estimated,
        matches_upper_bound,
        items,
        info,
    })
}

fn select_display_fields(data: &DocumentData, display: Option<&[String]>) -> BTreeMap<String, Value> {
    match display {
        None => data.fields.clone().into_iter().collect(),
        Some(names) => names
            .iter()
            .filter_map(|name| data.fields.get(name).map(|v| (name.clone(), v.clone())))
            .collect(),
    }
}
