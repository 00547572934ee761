//! Per-collection checkpoint log (spec §4.13), grounded on
//! `features/checkpoint_tasks.h`/`checkpoint_handlers.cc`: a server-minted
//! checkid travels through the processing queue, is marked reached once
//! every earlier-queued task for that collection has run, and can carry
//! error strings picked up along the way.

use crate::core::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointState {
    pub checkid: String,
    pub reached: bool,
    pub errors: Vec<String>,
}

impl CheckpointState {
    fn new(checkid: String) -> Self {
        CheckpointState { checkid, reached: false, errors: Vec::new() }
    }
}

/// Ordered checkpoint list for a single collection. `alloc_checkpoint`
/// mints an id without making it visible; `publish_checkpoint` is a
/// separate step so a handler can back out (e.g. if the queue was full or
/// closed) without leaving a checkpoint nobody will ever reach.
#[derive(Debug, Default)]
pub struct Checkpoints {
    order: Vec<String>,
    states: BTreeMap<String, CheckpointState>,
}

impl Checkpoints {
    pub fn new() -> Self {
        Checkpoints::default()
    }

    pub fn alloc_checkpoint(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub fn publish_checkpoint(&mut self, checkid: impl Into<String>) {
        let checkid = checkid.into();
        self.states.entry(checkid.clone()).or_insert_with(|| CheckpointState::new(checkid.clone()));
        if !self.order.contains(&checkid) {
            self.order.push(checkid);
        }
    }

    pub fn mark_reached(&mut self, checkid: &str) -> Result<()> {
        let state = self
            .states
            .get_mut(checkid)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("unknown checkpoint {checkid:?}")))?;
        state.reached = true;
        Ok(())
    }

    pub fn append_error(&mut self, checkid: &str, message: impl Into<String>) -> Result<()> {
        let state = self
            .states
            .get_mut(checkid)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("unknown checkpoint {checkid:?}")))?;
        state.errors.push(message.into());
        Ok(())
    }

    pub fn get(&self, checkid: &str) -> Option<&CheckpointState> {
        self.states.get(checkid)
    }

    /// Record `message` against every checkpoint that hasn't been reached
    /// yet (spec §4.13: a failing task fails every checkpoint still
    /// waiting behind it in the collection's queues).
    pub fn append_error_all(&mut self, message: impl Into<String>) {
        let message = message.into();
        for state in self.states.values_mut() {
            if !state.reached {
                state.errors.push(message.clone());
            }
        }
    }

    /// All checkpoints in publish order.
    pub fn get_all(&self) -> Vec<&CheckpointState> {
        self.order.iter().filter_map(|id| self.states.get(id)).collect()
    }
}
