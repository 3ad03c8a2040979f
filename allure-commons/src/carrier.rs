//! Per-flow storage for the current execution context.
//!
//! Each lifecycle instance owns its own carrier, so isolated instances
//! never observe each other's flow state even on the same thread. Slots
//! are keyed by thread id; a freshly spawned thread starts with an empty
//! context and receives a parent's state only through an explicit
//! capture/restore hand-off (see `AllureLifecycle::run_in_context` and
//! `AllureLifecycle::restore_context`).

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::context::AllureContext;

/// Flow-local slot holding the calling thread's current context.
#[derive(Debug, Default)]
pub struct ContextCarrier {
    // Entries for finished threads linger until the carrier is dropped;
    // a slot is two vecs of short strings, so this stays negligible.
    slots: Mutex<HashMap<ThreadId, AllureContext>>,
}

impl ContextCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the calling thread's current context, default-constructing
    /// an empty one on first access.
    pub fn current(&self) -> AllureContext {
        self.slots
            .lock()
            .entry(thread::current().id())
            .or_default()
            .clone()
    }

    /// Overwrites the calling thread's context, returning the previous one.
    pub fn replace(&self, context: AllureContext) -> AllureContext {
        self.slots
            .lock()
            .insert(thread::current().id(), context)
            .unwrap_or_default()
    }

    /// Drops the calling thread's slot entirely.
    pub fn clear(&self) {
        self.slots.lock().remove(&thread::current().id());
    }
}
