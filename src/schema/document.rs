//! `Document`/`DocumentData` (spec §3): the terms, value-slot entries, and
//! stored-field blob produced by running a JSON value through a `Schema`.

use crate::core::error::{Error, ErrorKind, Result};
use crate::varint;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A single generated term: its word-frequency increment and, for text
/// fields, the set of positions it occurred at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermEntry {
    pub wdf: u32,
    pub positions: BTreeSet<u32>,
}

/// The stored-field side table: field name -> raw JSON fragment, as
/// submitted (or as selected by `stored`/other field types that keep a
/// copy). Serializes to `(vint-len, name, vint-len, json) *` so that
/// deserialization can enforce the stream ends exactly at the declared
/// boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentData {
    pub fields: BTreeMap<String, Value>,
}

impl DocumentData {
    pub fn new() -> Self {
        DocumentData::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            let json_bytes = serde_json::to_vec(value)?;
            varint::encode(name.len() as u64, &mut out);
            out.extend_from_slice(name.as_bytes());
            varint::encode(json_bytes.len() as u64, &mut out);
            out.extend_from_slice(&json_bytes);
        }
        Ok(out)
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        let mut fields = BTreeMap::new();
        let mut reader = varint::VarintReader::new(buf);
        while reader.remaining() > 0 {
            let name_len = reader.read()? as usize;
            let name_bytes = reader.read_bytes(name_len)?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| Error::new(ErrorKind::Unserialization, "BadEncoding: field name is not UTF-8"))?
                .to_string();
            let json_len = reader.read()? as usize;
            let json_bytes = reader.read_bytes(json_len)?;
            let value: Value = serde_json::from_slice(json_bytes)?;
            fields.insert(name, value);
        }
        if reader.remaining() != 0 {
            return Err(Error::new(
                ErrorKind::Unserialization,
                "BadEncoding: document data stream did not end at declared boundary",
            ));
        }
        Ok(DocumentData { fields })
    }
}

/// The result of indexing a JSON value against a `Schema`: terms, value
/// slots, the stored-field blob, and (for types with an `id` field) the
/// idterm used for replace/delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub terms: BTreeMap<String, TermEntry>,
    /// slot -> ordered multi-set of raw value entries. Encoded into bytes
    /// at commit time using the slot's configured `ValueEncoding`.
    pub slots: BTreeMap<u32, Vec<Vec<u8>>>,
    pub data: DocumentData,
    pub idterm: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn add_term(&mut self, term: impl Into<String>, wdf_inc: u32, position: Option<u32>) {
        let entry = self.terms.entry(term.into()).or_default();
        entry.wdf += wdf_inc;
        if let Some(pos) = position {
            entry.positions.insert(pos);
        }
    }

    pub fn add_value(&mut self, slot: u32, value: Vec<u8>) {
        self.slots.entry(slot).or_default().push(value);
    }
}
