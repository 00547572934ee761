//! `Collection` and `CollectionPool` (spec §4.8), grounded on
//! `jsonxapian/collection.h`'s read-only/writable open distinction and on
//! the teacher's `core::config`/`core::error` conventions.

pub mod pool;

use crate::backend::{IndexBackend, MatchSpy, MemoryBackend, Query};
use crate::checkpoint::Checkpoints;
use crate::core::error::{Error, ErrorKind, Result};
use crate::query::search::{self, SearchRequest, SearchResponse};
use crate::schema::document::{Document, DocumentData};
use crate::schema::Schema;
use crate::taxonomy::CategoryHierarchy;
use serde_json::Value;
use std::collections::BTreeMap;

pub use pool::CollectionPool;

/// A named, durable inverted-index database: one Schema per document type,
/// a named-taxonomy registry, a meta-field name, and a checkpoint log.
pub struct Collection {
    name: String,
    backend: Box<dyn IndexBackend>,
    schemas: BTreeMap<String, Schema>,
    taxonomies: BTreeMap<String, CategoryHierarchy>,
    /// Pipe name -> document type it forwards to. A pipe with no explicit
    /// entry forwards to the identically-named document type.
    pipes: BTreeMap<String, String>,
    pub checkpoints: Checkpoints,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Collection {
            name: name.into(),
            backend: Box::new(MemoryBackend::new()),
            schemas: BTreeMap::new(),
            taxonomies: BTreeMap::new(),
            pipes: BTreeMap::new(),
            checkpoints: Checkpoints::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_count(&self) -> u64 {
        self.backend.doc_count()
    }

    pub fn schema(&self, doctype: &str) -> Option<&Schema> {
        self.schemas.get(doctype)
    }

    pub fn schema_mut(&mut self, doctype: &str) -> &mut Schema {
        self.schemas.entry(doctype.to_string()).or_default()
    }

    pub fn set_schema(&mut self, doctype: impl Into<String>, schema: Schema) -> Result<()> {
        let doctype = doctype.into();
        match self.schemas.get_mut(&doctype) {
            Some(existing) => existing.merge_from(&schema),
            None => {
                self.schemas.insert(doctype, schema);
                Ok(())
            }
        }
    }

    pub fn taxonomy(&self, name: &str) -> Option<&CategoryHierarchy> {
        self.taxonomies.get(name)
    }

    pub fn taxonomy_mut(&mut self, name: &str) -> &mut CategoryHierarchy {
        self.taxonomies.entry(name.to_string()).or_default()
    }

    /// Map pipe `pipe_name` onto `doctype` (§4.8). Pipes left unconfigured
    /// default to forwarding to the identically-named document type.
    pub fn set_pipe(&mut self, pipe_name: impl Into<String>, doctype: impl Into<String>) {
        self.pipes.insert(pipe_name.into(), doctype.into());
    }

    /// Forward `value` to `pipe_name`'s configured document type by
    /// enqueueing a process-document task on `taskman` (§4.8). Used by
    /// `ProcessingTaskKind::PipeDocument`.
    pub fn send_to_pipe(
        &self,
        taskman: &crate::tasks::manager::TaskManager,
        pipe_name: &str,
        value: &Value,
    ) -> crate::tasks::queue::QueueState {
        let doctype = self.pipes.get(pipe_name).map(String::as_str).unwrap_or(pipe_name);
        taskman.queue_process_document(&self.name, doctype, value.clone(), true)
    }

    /// Replace (or insert) a document already built from a prior `process_doc`
    /// call, keyed by its idterm.
    pub fn raw_update_doc(&mut self, idterm: &str, doc: Document) -> Result<()> {
        self.backend.replace_document(idterm, doc).map(|_| ())
    }

    pub fn raw_delete_doc(&mut self, idterm: &str) -> Result<bool> {
        self.backend.delete_document(idterm)
    }

    /// Run `value` through `doctype`'s schema, producing a `Document` and
    /// its idterm, auto-persisting any pattern-derived field config.
    pub fn process_doc(&mut self, doctype: &str, value: &serde_json::Value) -> Result<(Document, String)> {
        let schema = self.schemas.entry(doctype.to_string()).or_default();
        let doc = schema.process(doctype, value, &self.taxonomies)?;
        let idterm = doc
            .idterm
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "document type has no id field configured"))?;
        Ok((doc, idterm))
    }

    pub fn commit(&mut self) -> Result<()> {
        self.backend.commit()
    }

    /// Fetch the stored fields of one document by `(doctype, id)`, for the
    /// `GET /coll/{name}/type/{type}/id/{id}` route (§6.1). `None` if the
    /// idterm isn't present in the backend.
    pub fn get_document(&self, doctype: &str, id: &str) -> Result<Option<BTreeMap<String, Value>>> {
        let idterm = format!("\t{doctype}\t{id}");
        let Some(doc_id) = self.backend.doc_id_for_idterm(&idterm) else {
            return Ok(None);
        };
        let Some(bytes) = self.backend.get_document_data(doc_id) else {
            return Ok(None);
        };
        let data = DocumentData::deserialize(bytes)?;
        Ok(Some(data.fields.into_iter().collect()))
    }

    /// `GET /coll/{name}` route payload: document count plus the set of
    /// configured document types and their schemas.
    pub fn info_json(&self) -> Value {
        let types: BTreeMap<String, Value> = self
            .schemas
            .iter()
            .map(|(doctype, schema)| (doctype.clone(), serde_json::to_value(schema).unwrap_or(Value::Null)))
            .collect();
        serde_json::json!({
            "name": self.name,
            "doc_count": self.doc_count(),
            "types": types,
        })
    }

    pub fn perform_search(
        &self,
        doctype: &str,
        request: &SearchRequest,
        mut spies: Vec<(&str, &mut dyn MatchSpy)>,
    ) -> Result<SearchResponse> {
        let schema = self
            .schemas
            .get(doctype)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("unknown document type {doctype:?}")))?;
        let query: Query = crate::query::build_query(doctype, schema, &request.query)?;
        search::execute(self.backend.as_ref(), &query, request, &mut spies)
    }

    /// As `perform_search`, but resolves `field`/`meta` leaves against every
    /// document type in the collection rather than one (spec §4.6's
    /// collection-wide builder variant), OR-ing the field query across
    /// every type whose schema defines the field.
    pub fn perform_search_collection_wide(
        &self,
        request: &SearchRequest,
        mut spies: Vec<(&str, &mut dyn MatchSpy)>,
    ) -> Result<SearchResponse> {
        let query: Query = crate::query::build_query_collection(&self.schemas, &request.query)?;
        search::execute(self.backend.as_ref(), &query, request, &mut spies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{ExactFieldConfig, IdFieldConfig, MaxLen};
    use serde_json::json;

    fn schema_with_id_and_tag() -> Schema {
        let mut schema = Schema::new();
        schema.set_field("id", crate::schema::field::FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() }));
        schema.set_field(
            "tag",
            crate::schema::field::FieldConfig::Exact(ExactFieldConfig {
                prefix: "XTAG".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        );
        schema
    }

    #[test]
    fn process_then_update_then_search_roundtrips() {
        let mut coll = Collection::new("blog");
        coll.set_schema("post", schema_with_id_and_tag()).unwrap();
        let (doc, idterm) = coll.process_doc("post", &json!({"id": "1", "tag": "rust"})).unwrap();
        coll.raw_update_doc(&idterm, doc).unwrap();
        coll.commit().unwrap();
        assert_eq!(coll.doc_count(), 1);

        let request = SearchRequest::from_json(&json!({"query": {"field": ["tag", "is", "rust"]}}));
        let response = coll.perform_search("post", &request, vec![]).unwrap();
        assert_eq!(response.matches_estimated, 1);
    }

    #[test]
    fn id_is_query_finds_the_document_by_idterm() {
        let mut coll = Collection::new("blog");
        coll.set_schema("post", schema_with_id_and_tag()).unwrap();
        let (doc, idterm) = coll.process_doc("post", &json!({"id": 32, "tag": "rust"})).unwrap();
        coll.raw_update_doc(&idterm, doc).unwrap();
        coll.commit().unwrap();

        let request = SearchRequest::from_json(&json!({"query": {"field": ["id", "is", ["32"]]}}));
        let response = coll.perform_search("post", &request, vec![]).unwrap();
        assert_eq!(response.matches_estimated, 1);
    }

    #[test]
    fn delete_then_search_finds_nothing() {
        let mut coll = Collection::new("blog");
        coll.set_schema("post", schema_with_id_and_tag()).unwrap();
        let (doc, idterm) = coll.process_doc("post", &json!({"id": "1", "tag": "rust"})).unwrap();
        coll.raw_update_doc(&idterm, doc).unwrap();
        coll.raw_delete_doc(&idterm).unwrap();

        let request = SearchRequest::from_json(&json!({"query": {"field": ["tag", "is", "rust"]}}));
        let response = coll.perform_search("post", &request, vec![]).unwrap();
        assert_eq!(response.matches_estimated, 0);
    }

    #[test]
    fn get_document_round_trips_stored_fields() {
        let mut coll = Collection::new("blog");
        let mut schema = schema_with_id_and_tag();
        schema.set_field(
            "title",
            crate::schema::field::FieldConfig::Stored(crate::schema::field::StoredFieldConfig { store_field: None }),
        );
        coll.set_schema("post", schema).unwrap();
        let (doc, idterm) = coll.process_doc("post", &json!({"id": "1", "tag": "rust", "title": "hi"})).unwrap();
        coll.raw_update_doc(&idterm, doc).unwrap();

        let fields = coll.get_document("post", "1").unwrap().unwrap();
        assert_eq!(fields.get("title"), Some(&json!("hi")));
        assert!(coll.get_document("post", "missing").unwrap().is_none());
    }

    #[test]
    fn info_json_reports_doc_count_and_types() {
        let mut coll = Collection::new("blog");
        coll.set_schema("post", schema_with_id_and_tag()).unwrap();
        let (doc, idterm) = coll.process_doc("post", &json!({"id": "1", "tag": "rust"})).unwrap();
        coll.raw_update_doc(&idterm, doc).unwrap();
        let info = coll.info_json();
        assert_eq!(info["name"], json!("blog"));
        assert_eq!(info["doc_count"], json!(1));
        assert!(info["types"].get("post").is_some());
    }

    #[test]
    fn collection_wide_search_finds_matches_across_types() {
        let mut coll = Collection::new("blog");
        coll.set_schema("post", schema_with_id_and_tag()).unwrap();
        let mut comment_schema = Schema::new();
        comment_schema.set_field(
            "id",
            crate::schema::field::FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() }),
        );
        comment_schema.set_field(
            "tag",
            crate::schema::field::FieldConfig::Exact(ExactFieldConfig {
                prefix: "XCTAG".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        );
        coll.set_schema("comment", comment_schema).unwrap();

        let (doc, idterm) = coll.process_doc("comment", &json!({"id": "1", "tag": "rust"})).unwrap();
        coll.raw_update_doc(&idterm, doc).unwrap();
        coll.commit().unwrap();

        let request = SearchRequest::from_json(&json!({"query": {"field": ["tag", "is", "rust"]}}));
        let response = coll.perform_search_collection_wide(&request, vec![]).unwrap();
        assert_eq!(response.matches_estimated, 1);
    }

    #[test]
    fn search_on_unknown_doctype_errors() {
        let coll = Collection::new("blog");
        let request = SearchRequest::from_json(&json!({"query": {"matchall": true}}));
        assert!(coll.perform_search("missing", &request, vec![]).is_err());
    }
}
