//! Facet-count match spy (spec §4.7), grounded on
//! `matchspies::facetmatchspy::{BaseFacetMatchSpy, FacetCountMatchSpy}`.

use crate::backend::{IndexBackend, MatchSpy};
use serde_json::Value;
use std::collections::BTreeMap;

/// Observes every document a search matches and tallies how often each
/// distinct value in `slot` occurs. Installed even when the field the slot
/// belongs to can't be resolved - it then simply sees no documents.
pub struct FacetCountMatchSpy {
    slot: u32,
    doc_limit: u64,
    result_limit: usize,
    docs_seen: u64,
    values_seen: u64,
    counts: BTreeMap<Vec<u8>, u64>,
}

impl FacetCountMatchSpy {
    pub fn new(slot: u32, doc_limit: u64, result_limit: usize) -> Self {
        FacetCountMatchSpy {
            slot,
            doc_limit,
            result_limit,
            docs_seen: 0,
            values_seen: 0,
            counts: BTreeMap::new(),
        }
    }

    pub fn docs_seen(&self) -> u64 {
        self.docs_seen
    }

    pub fn values_seen(&self) -> u64 {
        self.values_seen
    }

    /// Top `result_limit` values by count, ties broken by byte order.
    pub fn top_values(&self) -> Vec<(Vec<u8>, u64)> {
        let mut entries: Vec<(Vec<u8>, u64)> = self.counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(self.result_limit);
        entries
    }
}

impl MatchSpy for FacetCountMatchSpy {
    fn observe(&mut self, doc_id: u32, backend: &dyn IndexBackend) {
        if self.doc_limit != 0 && self.docs_seen >= self.doc_limit {
            return;
        }
        self.docs_seen += 1;
        for value in backend.slot_values(doc_id, self.slot) {
            self.values_seen += 1;
            *self.counts.entry(value).or_insert(0) += 1;
        }
    }

    fn to_json(&self) -> Value {
        let counts: Vec<Value> = self
            .top_values()
            .into_iter()
            .map(|(value, count)| serde_json::json!([String::from_utf8_lossy(&value), count]))
            .collect();
        serde_json::json!({
            "type": "facetcount",
            "slot": self.slot,
            "docs_seen": self.docs_seen,
            "values_seen": self.values_seen,
            "counts": counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IndexBackend, MemoryBackend, Query};
    use crate::schema::document::Document;
    use crate::slots::ValueEncoding;

    #[test]
    fn counts_distinct_slot_values_across_matches() {
        let mut backend = MemoryBackend::new();
        backend.set_slot_encoding(9, ValueEncoding::Single);
        for (idterm, color) in [("\tp\t1", "red"), ("\tp\t2", "red"), ("\tp\t3", "blue")] {
            let mut doc = Document::new();
            doc.add_term("XTcolor".to_string(), 1, Some(0));
            doc.add_value(9, color.as_bytes().to_vec());
            backend.replace_document(idterm, doc).unwrap();
        }

        let mut spy = FacetCountMatchSpy::new(9, 0, 10);
        let mut spies: Vec<&mut dyn MatchSpy> = vec![&mut spy];
        backend.search(&Query::Term("XTcolor".into()), 0, 10, 10, &mut spies).unwrap();

        let top = spy.top_values();
        assert_eq!(top[0], (b"red".to_vec(), 2));
        assert_eq!(top[1], (b"blue".to_vec(), 1));
        assert_eq!(spy.docs_seen(), 3);
    }

    #[test]
    fn doc_limit_caps_observations() {
        let mut backend = MemoryBackend::new();
        backend.set_slot_encoding(9, ValueEncoding::Single);
        for idterm in ["\tp\t1", "\tp\t2", "\tp\t3"] {
            let mut doc = Document::new();
            doc.add_term("XTcolor".to_string(), 1, Some(0));
            doc.add_value(9, b"red".to_vec());
            backend.replace_document(idterm, doc).unwrap();
        }
        let mut spy = FacetCountMatchSpy::new(9, 2, 10);
        let mut spies: Vec<&mut dyn MatchSpy> = vec![&mut spy];
        backend.search(&Query::Term("XTcolor".into()), 0, 10, 10, &mut spies).unwrap();
        assert_eq!(spy.docs_seen(), 2);
    }
}
