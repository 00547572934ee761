//! Index backend (spec §4.6/§6.3): the `Query` tree that field configs and
//! the JSON query builder both target, plus the storage engine that can
//! evaluate it.

pub mod memory;

use crate::core::error::Result;
use crate::schema::document::Document;
use crate::slots::ValueEncoding;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use memory::MemoryBackend;

/// A backend-independent query tree. Built either directly by field
/// configs (`FieldConfig::query`) or by the JSON query-tree builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    MatchAll,
    MatchNothing,
    Term(String),
    Or(Vec<Query>),
    And(Vec<Query>),
    /// AND NOT: first clause minus the rest.
    AndNot(Box<Query>, Vec<Query>),
    /// Scoring comes from the primary clause; the rest only contribute
    /// extra weight to documents they also match.
    AndMaybe(Box<Query>, Vec<Query>),
    /// Intersect a scored query with an unscored filter.
    Filter(Box<Query>, Box<Query>),
    Scale(ordered_float_bits::OrderedF64, Box<Query>),
    /// Inclusive `[lo, hi]` range over a value slot's raw bytes.
    ValueRange(u32, Vec<u8>, Vec<u8>),
    Near(Vec<String>, u32),
    Phrase(Vec<String>),
}

impl Query {
    pub fn scale(factor: f64, query: Query) -> Query {
        Query::Scale(ordered_float_bits::OrderedF64(factor), Box::new(query))
    }
}

/// Minimal wrapper so `f64` can live inside a `derive(PartialEq)` enum
/// without pulling in a crate solely for that; query trees are compared in
/// tests but never hashed or ordered.
mod ordered_float_bits {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct OrderedF64(pub f64);

    impl PartialEq for OrderedF64 {
        fn eq(&self, other: &Self) -> bool {
            self.0.to_bits() == other.0.to_bits()
        }
    }
}

/// A single scored match produced by evaluating a `Query`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub doc_id: u32,
    pub weight: f64,
}

/// Installed alongside a search to observe every matching document,
/// independent of the final ranked/paginated result (spec §4.7).
pub trait MatchSpy: Send {
    fn observe(&mut self, doc_id: u32, backend: &dyn IndexBackend);

    /// Serialise this spy's accumulated results for the search response's
    /// `info` array, once the search that fed it has finished.
    fn to_json(&self) -> Value;
}

/// Results of running a query through `IndexBackend::search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<Hit>,
    pub matches_lower_bound: u64,
    pub matches_estimated: u64,
    pub matches_upper_bound: u64,
}

/// Storage + retrieval engine behind a collection. `MemoryBackend` is the
/// only implementation shipped here; real deployments would add a
/// persistent one behind the same trait.
pub trait IndexBackend: Send + Sync {
    fn doc_count(&self) -> u64;

    /// Insert or fully replace the document filed under `idterm` (the
    /// schema-generated `"\t<type>\t<id>"` term). Returns the previously
    /// assigned internal doc id, if this was a replace.
    fn replace_document(&mut self, idterm: &str, doc: Document) -> Result<u32>;

    fn delete_document(&mut self, idterm: &str) -> Result<bool>;

    fn get_document_data(&self, doc_id: u32) -> Option<&[u8]>;

    /// Resolve the schema-generated `"\t<type>\t<id>"` idterm to the
    /// backend's internal doc id, for the read-one-document route.
    fn doc_id_for_idterm(&self, idterm: &str) -> Option<u32>;

    fn commit(&mut self) -> Result<()>;

    /// Configure how a slot's bytes should be interpreted when iterating
    /// its values (needed by facet spies and range queries).
    fn set_slot_encoding(&mut self, slot: u32, encoding: ValueEncoding);

    fn slot_values(&self, doc_id: u32, slot: u32) -> Vec<Vec<u8>>;

    fn search(
        &self,
        query: &Query,
        from: usize,
        size: usize,
        check_at_least: usize,
        spies: &mut [&mut dyn MatchSpy],
    ) -> Result<SearchOutcome>;
}

/// doc id -> weight map used while evaluating a `Query` tree.
pub(crate) type ScoreMap = BTreeMap<u32, f64>;
