//! JSON query-tree builder (spec §4.6), match spies (spec §4.7), and the
//! conditionals used by the processing pipeline (SPEC_FULL.md §C), grounded
//! on `jsonxapian/query_builder.cc` and `matchspies/facetmatchspy.h`.

pub mod conditionals;
pub mod facet;
pub mod search;

use crate::backend::Query;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::Schema;
use serde_json::Value;
use std::collections::BTreeMap;

/// What a `field`/`meta` leaf is resolved against. [`TypedSchema`] implements
/// this for the type-specific builder variant (single-schema lookup, plus
/// the document type the `id` field's term needs); [`CollectionSchemas`]
/// implements it for the collection-wide variant, which ORs the field query
/// across every document type whose schema defines the field (spec §4.6:
/// "two builder variants exist").
pub trait FieldResolver {
    fn build_field_query(&self, field_name: &str, qtype: &str, params: &Value) -> Result<Query>;
}

/// Wraps a single document type's schema with its type name, since the
/// `id` field's term embeds the document type (see `FieldConfig::query`)
/// and `Schema` itself is type-agnostic.
pub struct TypedSchema<'a> {
    pub doctype: &'a str,
    pub schema: &'a Schema,
}

impl<'a> FieldResolver for TypedSchema<'a> {
    fn build_field_query(&self, field_name: &str, qtype: &str, params: &Value) -> Result<Query> {
        self.schema.build_field_query(self.doctype, field_name, qtype, params)
    }
}

/// Collection-wide field resolver: every document type's schema in one
/// collection, queried by OR-ing the per-type field query across every type
/// whose schema defines the field. A field absent from every type's schema
/// yields `matchnothing`, same as the type-specific variant.
pub struct CollectionSchemas<'a>(pub &'a BTreeMap<String, Schema>);

impl<'a> FieldResolver for CollectionSchemas<'a> {
    fn build_field_query(&self, field_name: &str, qtype: &str, params: &Value) -> Result<Query> {
        let mut clauses = Vec::new();
        for (doctype, schema) in self.0.iter() {
            if schema.config_for(field_name).is_some() {
                clauses.push(schema.build_field_query(doctype, field_name, qtype, params)?);
            }
        }
        match clauses.len() {
            0 => Ok(Query::MatchNothing),
            1 => Ok(clauses.into_iter().next().unwrap()),
            _ => Ok(Query::Or(clauses)),
        }
    }
}

fn check_single_member(obj: &serde_json::Map<String, Value>, key: &str) -> Result<()> {
    if obj.len() != 1 {
        return Err(Error::new(
            ErrorKind::InvalidValue,
            format!("{key:?} query must contain exactly one member"),
        ));
    }
    Ok(())
}

fn as_query_array<'a>(value: &'a Value, label: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::new(ErrorKind::InvalidValue, format!("{label} must be a JSON array")))
}

/// Turn a JSON query tree into a `backend::Query`, resolving `field`/`meta`
/// leaves against a single document type's `schema` (the type-specific
/// builder variant of spec §4.6). `doctype` is needed for the `id` field's
/// term, which embeds the document type.
pub fn build_query(doctype: &str, schema: &Schema, jsonquery: &Value) -> Result<Query> {
    build_query_with(&TypedSchema { doctype, schema }, jsonquery)
}

/// As `build_query`, but resolves `field`/`meta` leaves against every
/// document type in `schemas`, OR-ing the field query across every type
/// whose schema defines the field (the collection-wide builder variant of
/// spec §4.6).
pub fn build_query_collection(schemas: &BTreeMap<String, Schema>, jsonquery: &Value) -> Result<Query> {
    build_query_with(&CollectionSchemas(schemas), jsonquery)
}

fn build_query_with(resolver: &dyn FieldResolver, jsonquery: &Value) -> Result<Query> {
    if jsonquery.is_null() {
        return Ok(Query::MatchNothing);
    }
    let obj = jsonquery
        .as_object()
        .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "query tree must be a JSON object"))?;
    if obj.is_empty() {
        return Ok(Query::MatchNothing);
    }

    if let Some(params) = obj.get("matchall") {
        check_single_member(obj, "matchall")?;
        if params != &Value::Bool(true) {
            return Err(Error::new(ErrorKind::InvalidValue, "matchall query expects a value of true"));
        }
        return Ok(Query::MatchAll);
    }

    if let Some(params) = obj.get("matchnothing") {
        check_single_member(obj, "matchnothing")?;
        if params != &Value::Bool(true) {
            return Err(Error::new(ErrorKind::InvalidValue, "matchnothing query expects a value of true"));
        }
        return Ok(Query::MatchNothing);
    }

    if let Some(params) = obj.get("field") {
        check_single_member(obj, "field")?;
        let items = as_query_array(params, "field search parameters")?;
        if items.len() != 3 {
            return Err(Error::new(ErrorKind::InvalidValue, "field query parameters must have length 3"));
        }
        let field_name = items[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "field name must be a string"))?;
        let qtype = items[1]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "field query type must be a string"))?;
        return resolver.build_field_query(field_name, qtype, &items[2]);
    }

    if let Some(params) = obj.get("meta") {
        check_single_member(obj, "meta")?;
        let items = as_query_array(params, "meta search parameters")?;
        if items.len() != 2 {
            return Err(Error::new(ErrorKind::InvalidValue, "meta query parameters must have length 2"));
        }
        let qtype = items[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "meta query type must be a string"))?;
        return build_meta_query(resolver, qtype, &items[1]);
    }

    if obj.contains_key("filter") {
        let has_query = obj.contains_key("query");
        if (has_query && obj.len() != 2) || (!has_query && obj.len() != 1) {
            return Err(Error::new(ErrorKind::InvalidValue, "filter query must contain only filter and query members"));
        }
        let primary = match obj.get("query") {
            Some(Value::Null) | None => Query::MatchAll,
            Some(q) => build_query_with(resolver, q)?,
        };
        let filter = build_query_with(resolver, &obj["filter"])?;
        return Ok(Query::Filter(Box::new(primary), Box::new(filter)));
    }

    if let Some(params) = obj.get("and") {
        check_single_member(obj, "and")?;
        let items = as_query_array(params, "AND search parameters")?;
        let clauses = items.iter().map(|q| build_query_with(resolver, q)).collect::<Result<Vec<_>>>()?;
        return Ok(Query::And(clauses));
    }

    if let Some(params) = obj.get("or") {
        check_single_member(obj, "or")?;
        let items = as_query_array(params, "OR search parameters")?;
        let clauses = items.iter().map(|q| build_query_with(resolver, q)).collect::<Result<Vec<_>>>()?;
        return Ok(Query::Or(clauses));
    }

    if let Some(params) = obj.get("xor") {
        check_single_member(obj, "xor")?;
        let items = as_query_array(params, "XOR search parameters")?;
        let clauses = items.iter().map(|q| build_query_with(resolver, q)).collect::<Result<Vec<_>>>()?;
        return Ok(build_xor(clauses));
    }

    if let Some(params) = obj.get("not") {
        check_single_member(obj, "not")?;
        let items = as_query_array(params, "NOT search parameters")?;
        if items.len() < 2 {
            return Err(Error::new(ErrorKind::InvalidValue, "not query must contain at least two subqueries"));
        }
        let positive = build_query_with(resolver, &items[0])?;
        let negatives = items[1..].iter().map(|q| build_query_with(resolver, q)).collect::<Result<Vec<_>>>()?;
        return Ok(Query::AndNot(Box::new(positive), negatives));
    }

    if let Some(params) = obj.get("and_maybe") {
        check_single_member(obj, "and_maybe")?;
        let items = as_query_array(params, "AND_MAYBE search parameters")?;
        if items.len() < 2 {
            return Err(Error::new(ErrorKind::InvalidValue, "and_maybe query must contain at least two subqueries"));
        }
        let main = build_query_with(resolver, &items[0])?;
        let maybes = items[1..].iter().map(|q| build_query_with(resolver, q)).collect::<Result<Vec<_>>>()?;
        return Ok(Query::AndMaybe(Box::new(main), maybes));
    }

    if let Some(params) = obj.get("scale") {
        check_single_member(obj, "scale")?;
        let sub = params
            .get("query")
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "scale query must contain a query member"))?;
        let subquery = build_query_with(resolver, sub)?;
        let factor = params.get("factor").and_then(Value::as_f64).unwrap_or(0.0);
        return Ok(Query::scale(factor, subquery));
    }

    Err(Error::new(ErrorKind::InvalidValue, "invalid query specification - no known members in query object"))
}

fn build_xor(clauses: Vec<Query>) -> Query {
    // A OP_XOR B == (A OR B) AND NOT (A AND B), generalised pairwise for N
    // clauses the way Xapian folds a multi-way XOR.
    if clauses.is_empty() {
        return Query::MatchNothing;
    }
    clauses
        .into_iter()
        .reduce(|acc, next| {
            let either = Query::Or(vec![acc.clone(), next.clone()]);
            let both = Query::And(vec![acc, next]);
            Query::AndNot(Box::new(either), vec![both])
        })
        .unwrap()
}

/// The collection-wide meta query: OR over every field's `meta` config
/// (there is at most one, conventionally named `meta` in each schema).
fn build_meta_query(resolver: &dyn FieldResolver, qtype: &str, params: &Value) -> Result<Query> {
    resolver.build_field_query("meta", qtype, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{ExactFieldConfig, MaxLen};
    use crate::schema::field::FieldConfig;
    use serde_json::json;

    fn schema_with_tag() -> Schema {
        let mut schema = Schema::new();
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
    fn matchall_and_matchnothing() {
        let schema = Schema::new();
        assert_eq!(build_query("blog", &schema, &json!({"matchall": true})).unwrap(), Query::MatchAll);
        assert_eq!(build_query("blog", &schema, &json!({"matchnothing": true})).unwrap(), Query::MatchNothing);
        assert_eq!(build_query("blog", &schema, &Value::Null).unwrap(), Query::MatchNothing);
    }

    #[test]
    fn field_query_dispatches_to_schema() {
        let schema = schema_with_tag();
        let query = build_query("blog", &schema, &json!({"field": ["tag", "is", "rust"]})).unwrap();
        assert_eq!(query, Query::Or(vec![Query::Term("XTAG\trust".into())]));
    }

    #[test]
    fn and_or_not_compose() {
        let schema = schema_with_tag();
        let q = build_query(
            "blog",
            &schema,
            &json!({"not": [
                {"field": ["tag", "is", "rust"]},
                {"field": ["tag", "is", "java"]}
            ]}),
        )
        .unwrap();
        match q {
            Query::AndNot(_, negatives) => assert_eq!(negatives.len(), 1),
            other => panic!("expected AndNot, got {other:?}"),
        }
    }

    #[test]
    fn rejects_multi_key_object() {
        let schema = Schema::new();
        let result = build_query("blog", &schema, &json!({"matchall": true, "matchnothing": true}));
        assert!(result.is_err());
    }

    #[test]
    fn collection_wide_builder_ors_across_types_that_define_the_field() {
        let mut post_schema = Schema::new();
        post_schema.set_field(
            "tag",
            FieldConfig::Exact(ExactFieldConfig {
                prefix: "XPOSTTAG".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        );
        let mut comment_schema = Schema::new();
        comment_schema.set_field(
            "tag",
            FieldConfig::Exact(ExactFieldConfig {
                prefix: "XCOMMENTTAG".into(),
                store_field: None,
                wdfinc: 0,
                max_len: MaxLen::default(),
            }),
        );
        let mut schemas = BTreeMap::new();
        schemas.insert("post".to_string(), post_schema);
        schemas.insert("comment".to_string(), comment_schema);

        let query = build_query_collection(&schemas, &json!({"field": ["tag", "is", "rust"]})).unwrap();
        match query {
            Query::Or(clauses) => assert_eq!(clauses.len(), 2),
            other => panic!("expected an OR across both types, got {other:?}"),
        }
    }

    #[test]
    fn collection_wide_builder_is_matchnothing_when_no_type_defines_the_field() {
        let schemas: BTreeMap<String, Schema> = BTreeMap::new();
        let query = build_query_collection(&schemas, &json!({"field": ["nope", "is", "x"]})).unwrap();
        assert_eq!(query, Query::MatchNothing);
    }

    #[test]
    fn filter_defaults_primary_to_matchall() {
        let schema = schema_with_tag();
        let q = build_query("blog", &schema, &json!({"filter": {"field": ["tag", "is", "rust"]}})).unwrap();
        match q {
            Query::Filter(primary, _) => assert_eq!(*primary, Query::MatchAll),
            other => panic!("expected Filter, got {other:?}"),
        }
    }
}
