//! Serialized server evaluation per source module.
//!
//! Evaluations of one module never overlap: each holds that module's slot
//! for its whole duration. Different modules evaluate concurrently.
//!
//! While an evaluation runs, its source id is in flight. A server-side
//! transform of that same id (a module importing itself through a cycle)
//! is answered from the current record instead of evaluating again.
//!
//! State set by the server pass of an evaluation (the custom transform's
//! one-shot callback, the degraded flag) is keyed by source id and cleared
//! before the next evaluation of that module starts.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::Pipeline;
use crate::debug;
use crate::entry::StyleEntry;
use crate::export;
use crate::host::EvaluatedCallback;

/// Outcome of one server evaluation.
#[derive(Debug)]
pub(super) enum Evaluation {
    /// Entries with interpolations evaluated.
    Resolved(Vec<StyleEntry>),
    /// Evaluation failed; the client entries stand in.
    Fallback,
    /// A newer edit owns the record.
    Superseded,
}

#[derive(Default)]
pub(super) struct Coordinator {
    slots: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    callbacks: Mutex<FxHashMap<String, EvaluatedCallback>>,
    degraded: Mutex<FxHashSet<String>>,
    in_flight: Mutex<FxHashSet<String>>,
}

/// Keeps a source id in flight until dropped.
struct InFlight<'a> {
    coordinator: &'a Coordinator,
    source_id: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.coordinator.in_flight.lock().remove(self.source_id);
    }
}

impl Coordinator {
    fn slot(&self, source_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.slots
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .clone()
    }

    fn enter<'a>(&'a self, source_id: &'a str) -> InFlight<'a> {
        self.in_flight.lock().insert(source_id.to_string());
        InFlight {
            coordinator: self,
            source_id,
        }
    }

    /// Whether an evaluation of `source_id` is running.
    pub fn is_evaluating(&self, source_id: &str) -> bool {
        self.in_flight.lock().contains(source_id)
    }

    /// Register the callback to run once the module finishes evaluating.
    /// A callback registered earlier and never run is dropped.
    pub fn set_callback(&self, source_id: &str, callback: EvaluatedCallback) {
        self.callbacks
            .lock()
            .insert(source_id.to_string(), callback);
    }

    fn take_callback(&self, source_id: &str) -> Option<EvaluatedCallback> {
        self.callbacks.lock().remove(source_id)
    }

    /// Mark the running evaluation as failed in its server pass.
    pub fn mark_degraded(&self, source_id: &str) {
        self.degraded.lock().insert(source_id.to_string());
    }

    fn take_degraded(&self, source_id: &str) -> bool {
        self.degraded.lock().remove(source_id)
    }

    pub fn forget(&self, source_id: &str) {
        self.slots.lock().remove(source_id);
        self.callbacks.lock().remove(source_id);
        self.degraded.lock().remove(source_id);
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
        self.callbacks.lock().clear();
        self.degraded.lock().clear();
    }
}

impl Pipeline {
    /// Evaluate the virtual code module of `source_id` for `generation`.
    pub(super) async fn evaluate(&self, source_id: &str, generation: u64) -> Evaluation {
        let slot = self.coordinator.slot(source_id);
        let _running = slot.lock().await;
        let _in_flight = self.coordinator.enter(source_id);

        let virtual_code_id = {
            let mut registry = self.registry.lock();
            if !registry.begin_evaluation(source_id, generation) {
                return Evaluation::Superseded;
            }
            match registry.find_by_source(source_id) {
                Some(record) => record.virtual_code_id.clone(),
                None => return Evaluation::Superseded,
            }
        };

        drop(self.coordinator.take_callback(source_id));
        self.coordinator.take_degraded(source_id);

        debug!("eval"; "{} (generation {})", virtual_code_id, generation);
        self.host.invalidate_module(&virtual_code_id);
        let result = self.host.evaluate(&virtual_code_id).await;

        if let Some(callback) = self.coordinator.take_callback(source_id) {
            callback();
        }
        // the server pass already reported its failure
        if self.coordinator.take_degraded(source_id) {
            return Evaluation::Fallback;
        }

        let namespace = match result {
            Ok(namespace) => namespace,
            Err(err) => {
                self.diagnostics
                    .error(source_id, format!("server evaluation failed: {err:#}"));
                return Evaluation::Fallback;
            }
        };
        let entries = match export::read_entries(&namespace) {
            Ok(entries) => entries,
            Err(err) => {
                self.diagnostics.error(source_id, err.to_string());
                return Evaluation::Fallback;
            }
        };
        if entries.is_empty() {
            self.diagnostics.warn(
                source_id,
                "server evaluation produced no entries, keeping unevaluated styles",
            );
            return Evaluation::Fallback;
        }

        let current = self
            .registry
            .lock()
            .find_by_source(source_id)
            .is_some_and(|record| record.generation == generation);
        if !current {
            return Evaluation::Superseded;
        }
        Evaluation::Resolved(entries)
    }
}
