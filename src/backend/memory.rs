//! In-memory `IndexBackend` (grounged on the teacher's
//! `index::inverted::InvertedIndex` / `index::posting::PostingList` shape,
//! generalized from a single-field word index to the multi-field term +
//! value-slot index the schema produces).

use crate::backend::{Hit, IndexBackend, MatchSpy, Query, ScoreMap, SearchOutcome};
use crate::core::error::Result;
use crate::schema::document::{Document, TermEntry};
use crate::slots::ValueEncoding;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryBackend {
    next_doc_id: u32,
    idterm_to_docid: BTreeMap<String, u32>,
    docid_to_idterm: BTreeMap<u32, String>,
    terms: BTreeMap<String, BTreeMap<u32, TermEntry>>,
    slots: BTreeMap<u32, BTreeMap<u32, Vec<u8>>>,
    slot_encodings: BTreeMap<u32, ValueEncoding>,
    data: BTreeMap<u32, Vec<u8>>,
    live: RoaringBitmap,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    fn alloc_doc_id(&mut self) -> u32 {
        let id = self.next_doc_id;
        self.next_doc_id += 1;
        id
    }

    fn remove_doc_postings(&mut self, doc_id: u32) {
        for postings in self.terms.values_mut() {
            postings.remove(&doc_id);
        }
        for values in self.slots.values_mut() {
            values.remove(&doc_id);
        }
        self.data.remove(&doc_id);
        self.live.remove(doc_id);
    }

    fn term_postings(&self, term: &str) -> Option<&BTreeMap<u32, TermEntry>> {
        self.terms.get(term)
    }

    fn eval(&self, query: &Query) -> ScoreMap {
        match query {
            Query::MatchAll => self.live.iter().map(|id| (id, 1.0)).collect(),
            Query::MatchNothing => ScoreMap::new(),
            Query::Term(term) => self
                .term_postings(term)
                .map(|postings| {
                    postings
                        .iter()
                        .filter(|(id, _)| self.live.contains(**id))
                        .map(|(&id, entry)| (id, (entry.wdf.max(1)) as f64))
                        .collect()
                })
                .unwrap_or_default(),
            Query::Or(clauses) => {
                let mut acc = ScoreMap::new();
                for clause in clauses {
                    for (id, weight) in self.eval(clause) {
                        *acc.entry(id).or_insert(0.0) += weight;
                    }
                }
                acc
            }
            Query::And(clauses) => {
                let mut iter = clauses.iter();
                let Some(first) = iter.next() else { return ScoreMap::new() };
                let mut acc = self.eval(first);
                for clause in iter {
                    let other = self.eval(clause);
                    acc.retain(|id, weight| {
                        if let Some(w) = other.get(id) {
                            *weight += w;
                            true
                        } else {
                            false
                        }
                    });
                }
                acc
            }
            Query::AndNot(primary, excludes) => {
                let mut acc = self.eval(primary);
                for exclude in excludes {
                    let other = self.eval(exclude);
                    acc.retain(|id, _| !other.contains_key(id));
                }
                acc
            }
            Query::AndMaybe(primary, extra) => {
                let mut acc = self.eval(primary);
                for clause in extra {
                    let other = self.eval(clause);
                    for (id, weight) in acc.iter_mut() {
                        if let Some(w) = other.get(id) {
                            *weight += w;
                        }
                    }
                }
                acc
            }
            Query::Filter(scored, filter) => {
                let mut acc = self.eval(scored);
                let filter_set = self.eval(filter);
                acc.retain(|id, _| filter_set.contains_key(id));
                acc
            }
            Query::Scale(factor, inner) => {
                let mut acc = self.eval(inner);
                for weight in acc.values_mut() {
                    *weight *= factor.0;
                }
                acc
            }
            Query::ValueRange(slot, lo, hi) => self
                .slots
                .get(slot)
                .map(|values| {
                    values
                        .iter()
                        .filter(|(id, bytes)| {
                            self.live.contains(**id) && bytes.as_slice() >= lo.as_slice() && bytes.as_slice() <= hi.as_slice()
                        })
                        .map(|(&id, _)| (id, 1.0))
                        .collect()
                })
                .unwrap_or_default(),
            Query::Phrase(terms) => self.eval_phrase(terms, 0),
            Query::Near(terms, window) => self.eval_phrase(terms, *window),
        }
    }

    /// Documents where `terms` occur in order, each at most `slop`
    /// positions apart from an ideal consecutive run (`slop == 0` means an
    /// exact phrase).
    fn eval_phrase(&self, terms: &[String], slop: u32) -> ScoreMap {
        let Some((first, rest)) = terms.split_first() else { return ScoreMap::new() };
        let Some(first_postings) = self.term_postings(first) else { return ScoreMap::new() };
        let mut acc = ScoreMap::new();
        'docs: for (&doc_id, entry) in first_postings {
            if !self.live.contains(doc_id) {
                continue;
            }
            for &start in &entry.positions {
                let mut expected = start;
                let mut ok = true;
                for term in rest {
                    expected += 1;
                    let Some(postings) = self.term_postings(term) else {
                        ok = false;
                        break;
                    };
                    let Some(other_entry) = postings.get(&doc_id) else {
                        ok = false;
                        break;
                    };
                    let within = other_entry
                        .positions
                        .iter()
                        .any(|&p| p >= expected.saturating_sub(slop) && p <= expected + slop);
                    if !within {
                        ok = false;
                        break;
                    }
                }
                if ok {
                    acc.insert(doc_id, 1.0);
                    continue 'docs;
                }
            }
        }
        acc
    }
}

impl IndexBackend for MemoryBackend {
    fn doc_count(&self) -> u64 {
        self.live.len() as u64
    }

    fn replace_document(&mut self, idterm: &str, doc: Document) -> Result<u32> {
        let doc_id = if let Some(&existing) = self.idterm_to_docid.get(idterm) {
            self.remove_doc_postings(existing);
            existing
        } else {
            self.alloc_doc_id()
        };
        self.idterm_to_docid.insert(idterm.to_string(), doc_id);
        self.docid_to_idterm.insert(doc_id, idterm.to_string());
        for (term, entry) in doc.terms {
            self.terms.entry(term).or_default().insert(doc_id, entry);
        }
        for (slot, values) in doc.slots {
            let encoding = self.slot_encodings.get(&slot).copied().unwrap_or(crate::slots::ValueEncoding::Single);
            let refs: Vec<&[u8]> = values.iter().map(|v| v.as_slice()).collect();
            let encoded = crate::slots::codec::encode(encoding, &refs)?;
            self.slots.entry(slot).or_default().insert(doc_id, encoded);
        }
        let data_bytes = doc.data.serialize()?;
        self.data.insert(doc_id, data_bytes);
        self.live.insert(doc_id);
        Ok(doc_id)
    }

    fn delete_document(&mut self, idterm: &str) -> Result<bool> {
        if let Some(doc_id) = self.idterm_to_docid.remove(idterm) {
            self.docid_to_idterm.remove(&doc_id);
            self.remove_doc_postings(doc_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn get_document_data(&self, doc_id: u32) -> Option<&[u8]> {
        self.data.get(&doc_id).map(|v| v.as_slice())
    }

    fn doc_id_for_idterm(&self, idterm: &str) -> Option<u32> {
        self.idterm_to_docid.get(idterm).copied()
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_slot_encoding(&mut self, slot: u32, encoding: ValueEncoding) {
        self.slot_encodings.insert(slot, encoding);
    }

    fn slot_values(&self, doc_id: u32, slot: u32) -> Vec<Vec<u8>> {
        let Some(bytes) = self.slots.get(&slot).and_then(|m| m.get(&doc_id)) else {
            return Vec::new();
        };
        let encoding = self.slot_encodings.get(&slot).copied().unwrap_or(ValueEncoding::Single);
        let mut decoder = crate::slots::SlotDecoder::new(encoding);
        if decoder.newdoc(bytes).is_err() {
            return Vec::new();
        }
        let mut out = Vec::new();
        while let Ok(Some(value)) = decoder.next() {
            out.push(value.to_vec());
        }
        out
    }

    fn search(
        &self,
        query: &Query,
        from: usize,
        size: usize,
        check_at_least: usize,
        spies: &mut [&mut dyn MatchSpy],
    ) -> Result<SearchOutcome> {
        let scores = self.eval(query);
        let total = scores.len();
        let mut ranked: Vec<Hit> = scores.into_iter().map(|(doc_id, weight)| Hit { doc_id, weight }).collect();
        ranked.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal).then(a.doc_id.cmp(&b.doc_id)));
        // Spies must see documents in MSet rank order (spec §4.7): doc_limit
        // caps the highest-ranked documents, not an arbitrary subset.
        for hit in &ranked {
            for spy in spies.iter_mut() {
                spy.observe(hit.doc_id, self);
            }
        }
        let page = ranked.into_iter().skip(from).take(size).collect();
        let estimated = total.max(check_at_least.min(total));
        Ok(SearchOutcome {
            hits: page,
            matches_lower_bound: total as u64,
            matches_estimated: estimated as u64,
            matches_upper_bound: total as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::document::Document;

    fn doc_with_term(term: &str) -> Document {
        let mut doc = Document::new();
        doc.add_term(term.to_string(), 1, Some(0));
        doc
    }

    #[test]
    fn replace_then_search_term_finds_document() {
        let mut backend = MemoryBackend::new();
        backend.replace_document("\tblog\t1", doc_with_term("XTcat")).unwrap();
        let outcome = backend.search(&Query::Term("XTcat".into()), 0, 10, 10, &mut []).unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[test]
    fn delete_removes_from_postings() {
        let mut backend = MemoryBackend::new();
        backend.replace_document("\tblog\t1", doc_with_term("XTcat")).unwrap();
        assert!(backend.delete_document("\tblog\t1").unwrap());
        let outcome = backend.search(&Query::Term("XTcat".into()), 0, 10, 10, &mut []).unwrap();
        assert_eq!(outcome.hits.len(), 0);
    }

    #[test]
    fn replace_with_same_idterm_overwrites_doc_id() {
        let mut backend = MemoryBackend::new();
        backend.replace_document("\tblog\t1", doc_with_term("XTone")).unwrap();
        backend.replace_document("\tblog\t1", doc_with_term("XTtwo")).unwrap();
        let outcome = backend.search(&Query::Term("XTone".into()), 0, 10, 10, &mut []).unwrap();
        assert_eq!(outcome.hits.len(), 0);
        let outcome = backend.search(&Query::Term("XTtwo".into()), 0, 10, 10, &mut []).unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[test]
    fn and_query_requires_both_terms() {
        let mut backend = MemoryBackend::new();
        let mut doc = Document::new();
        doc.add_term("XTa".to_string(), 1, Some(0));
        doc.add_term("XTb".to_string(), 1, Some(1));
        backend.replace_document("\tblog\t1", doc).unwrap();
        backend.replace_document("\tblog\t2", doc_with_term("XTa")).unwrap();
        let outcome = backend
            .search(&Query::And(vec![Query::Term("XTa".into()), Query::Term("XTb".into())]), 0, 10, 10, &mut [])
            .unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[test]
    fn doc_id_for_idterm_resolves_live_documents() {
        let mut backend = MemoryBackend::new();
        backend.replace_document("\tblog\t1", doc_with_term("XTcat")).unwrap();
        assert!(backend.doc_id_for_idterm("\tblog\t1").is_some());
        assert!(backend.doc_id_for_idterm("\tblog\tmissing").is_none());
    }

    #[test]
    fn value_range_filters_by_slot_bytes() {
        let mut backend = MemoryBackend::new();
        backend.set_slot_encoding(5, ValueEncoding::Single);
        let mut doc = Document::new();
        doc.add_value(5, vec![0, 0, 0, 10]);
        backend.replace_document("\tblog\t1", doc).unwrap();
        let outcome = backend
            .search(&Query::ValueRange(5, vec![0, 0, 0, 5], vec![0, 0, 0, 20]), 0, 10, 10, &mut [])
            .unwrap();
        assert_eq!(outcome.hits.len(), 1);
        let outcome = backend
            .search(&Query::ValueRange(5, vec![0, 0, 0, 20], vec![0, 0, 0, 30]), 0, 10, 10, &mut [])
            .unwrap();
        assert_eq!(outcome.hits.len(), 0);
    }
}
