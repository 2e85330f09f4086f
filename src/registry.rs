//! Virtual module registry.
//!
//! One record per real source file that contains at least one style
//! template. The registry is owned by the pipeline and indexed three ways:
//!
//! ```text
//! records   source id        -> VirtualModuleRecord
//! by_code   virtual code id  -> source id
//! by_style  virtual style id -> source id
//! ```
//!
//! Every mutation reports the virtual style ids whose served content is now
//! out of date, so the caller can invalidate them in the host graph.

use rustc_hash::FxHashMap;

use crate::address::{virtual_module_id, virtual_style_id};
use crate::entry::StyleEntry;
use crate::utils::hash::ContentHash;

/// Resolution state of a record's stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleState {
    /// Client entries stored, server pass not run yet.
    Pending,
    Evaluating,
    /// Sheet compiled from final entries.
    Resolved,
}

#[derive(Debug, Clone)]
pub struct VirtualModuleRecord {
    pub source_id: String,
    pub virtual_code_id: String,
    pub virtual_style_id: String,
    /// Original source text.
    pub source_code: String,
    /// Source with call sites replaced, before any import or export is added.
    pub rewritten_code: String,
    /// In call-site order; never reordered.
    pub entries: Vec<StyleEntry>,
    pub compiled: Option<String>,
    pub content_hash: Option<ContentHash>,
    pub state: StyleState,
    /// Bumped on every upsert; completions carrying an older value are stale.
    pub generation: u64,
}

/// Input of [`ModuleRegistry::upsert`].
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub source_id: String,
    pub source_code: String,
    pub rewritten_code: String,
    pub entries: Vec<StyleEntry>,
    /// Extension of the virtual stylesheet, with leading dot.
    pub extension: String,
    /// Final sheet when no server pass follows.
    pub compiled: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Stored { generation: u64 },
    /// Zero entries: the prior record was deleted.
    Removed,
    /// Zero entries and nothing stored before.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "invalidated style ids must be forwarded to the host"]
pub struct Upsert {
    pub outcome: UpsertOutcome,
    pub invalidated: Vec<String>,
    /// Another live source already serving the same virtual style id.
    pub conflict: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "invalidated style ids must be forwarded to the host"]
pub enum Finalize {
    Applied { invalidated: Vec<String> },
    /// The record was superseded or removed meanwhile.
    Stale,
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    records: FxHashMap<String, VirtualModuleRecord>,
    by_code: FxHashMap<String, String>,
    by_style: FxHashMap<String, String>,
    generation: u64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest extraction of a source file, fully replacing the
    /// previous record.
    pub fn upsert(&mut self, draft: RecordDraft) -> Upsert {
        if draft.entries.is_empty() {
            return match self.remove(&draft.source_id) {
                Some(old) => Upsert {
                    outcome: UpsertOutcome::Removed,
                    invalidated: vec![old.virtual_style_id],
                    conflict: None,
                },
                None => Upsert {
                    outcome: UpsertOutcome::Ignored,
                    invalidated: Vec::new(),
                    conflict: None,
                },
            };
        }

        self.generation += 1;
        let generation = self.generation;
        let virtual_code_id = virtual_module_id(&draft.source_id);
        let virtual_style_id = virtual_style_id(&draft.source_id, &draft.extension);

        let previous = self.records.remove(&draft.source_id);
        let mut invalidated = Vec::new();

        let (compiled, content_hash, state) = match draft.compiled {
            Some(sheet) => {
                let hash = ContentHash::of(&sheet);
                (Some(sheet), Some(hash), StyleState::Resolved)
            }
            // keep serving the last sheet until the server pass lands
            None => match &previous {
                Some(prev) if prev.virtual_style_id == virtual_style_id => {
                    (prev.compiled.clone(), prev.content_hash, StyleState::Pending)
                }
                _ => (None, None, StyleState::Pending),
            },
        };

        if let Some(prev) = &previous {
            if prev.virtual_style_id != virtual_style_id {
                self.release_style(&prev.virtual_style_id, &draft.source_id);
                invalidated.push(prev.virtual_style_id.clone());
                invalidated.push(virtual_style_id.clone());
            } else if prev.content_hash != content_hash {
                invalidated.push(virtual_style_id.clone());
            }
        } else if content_hash.is_some() {
            invalidated.push(virtual_style_id.clone());
        }

        let conflict = self
            .by_style
            .insert(virtual_style_id.clone(), draft.source_id.clone())
            .filter(|owner| *owner != draft.source_id && self.records.contains_key(owner));
        self.by_code
            .insert(virtual_code_id.clone(), draft.source_id.clone());
        self.records.insert(
            draft.source_id.clone(),
            VirtualModuleRecord {
                source_id: draft.source_id,
                virtual_code_id,
                virtual_style_id,
                source_code: draft.source_code,
                rewritten_code: draft.rewritten_code,
                entries: draft.entries,
                compiled,
                content_hash,
                state,
                generation,
            },
        );

        Upsert {
            outcome: UpsertOutcome::Stored { generation },
            invalidated,
            conflict,
        }
    }

    pub fn find_by_source(&self, source_id: &str) -> Option<&VirtualModuleRecord> {
        self.records.get(source_id)
    }

    pub fn find_by_code(&self, virtual_code_id: &str) -> Option<&VirtualModuleRecord> {
        self.by_code
            .get(virtual_code_id)
            .and_then(|source| self.records.get(source))
    }

    pub fn find_by_style(&self, virtual_style_id: &str) -> Option<&VirtualModuleRecord> {
        self.by_style
            .get(virtual_style_id)
            .and_then(|source| self.records.get(source))
    }

    pub fn remove(&mut self, source_id: &str) -> Option<VirtualModuleRecord> {
        let record = self.records.remove(source_id)?;
        if self.by_code.get(&record.virtual_code_id).map(String::as_str) == Some(source_id) {
            self.by_code.remove(&record.virtual_code_id);
        }
        self.release_style(&record.virtual_style_id, source_id);
        Some(record)
    }

    /// Unlink `style_id` from `source_id`. When another record shares the id,
    /// the index moves to it instead of dropping.
    fn release_style(&mut self, style_id: &str, source_id: &str) {
        if self.by_style.get(style_id).map(String::as_str) != Some(source_id) {
            return;
        }
        let heir = self
            .records
            .values()
            .find(|r| r.source_id != source_id && r.virtual_style_id == style_id)
            .map(|r| r.source_id.clone());
        match heir {
            Some(heir) => {
                self.by_style.insert(style_id.to_string(), heir);
            }
            None => {
                self.by_style.remove(style_id);
            }
        }
    }

    /// Mark the record as evaluating if `generation` is still current.
    pub fn begin_evaluation(&mut self, source_id: &str, generation: u64) -> bool {
        match self.records.get_mut(source_id) {
            Some(record) if record.generation == generation => {
                record.state = StyleState::Evaluating;
                true
            }
            _ => false,
        }
    }

    /// Install the final entries and sheet of a server pass.
    pub fn finalize(
        &mut self,
        source_id: &str,
        generation: u64,
        entries: Vec<StyleEntry>,
        sheet: String,
    ) -> Finalize {
        let Some(record) = self.records.get_mut(source_id) else {
            return Finalize::Stale;
        };
        if record.generation != generation {
            return Finalize::Stale;
        }

        let hash = ContentHash::of(&sheet);
        let changed = record.content_hash != Some(hash);
        record.entries = entries;
        record.compiled = Some(sheet);
        record.content_hash = Some(hash);
        record.state = StyleState::Resolved;

        Finalize::Applied {
            invalidated: if changed {
                vec![record.virtual_style_id.clone()]
            } else {
                Vec::new()
            },
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &VirtualModuleRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_code.clear();
        self.by_style.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(entries: usize, compiled: Option<&str>) -> RecordDraft {
        RecordDraft {
            source_id: "/src/app.tsx".into(),
            source_code: "src".into(),
            rewritten_code: "rewritten".into(),
            entries: (0..entries)
                .map(|i| StyleEntry::new(format!("id{i}"), format!("a: {i};"), false))
                .collect(),
            extension: ".css".into(),
            compiled: compiled.map(str::to_string),
        }
    }

    #[test]
    fn test_upsert_indexes_all_ids() {
        let mut registry = ModuleRegistry::new();
        let result = registry.upsert(draft(1, Some(".id0 { a: 0; }")));
        assert!(matches!(result.outcome, UpsertOutcome::Stored { .. }));
        assert_eq!(result.invalidated, ["/@toad/style/src/app.css"]);

        let by_source = registry.find_by_source("/src/app.tsx").unwrap();
        assert_eq!(by_source.state, StyleState::Resolved);
        assert!(registry.find_by_code("/@toad/module/src/app.tsx").is_some());
        assert!(registry.find_by_style("/@toad/style/src/app.css").is_some());
    }

    #[test]
    fn test_zero_entries_removes_record() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(1, Some("sheet")));
        let result = registry.upsert(draft(0, None));
        assert_eq!(result.outcome, UpsertOutcome::Removed);
        assert_eq!(result.invalidated, ["/@toad/style/src/app.css"]);
        assert!(registry.find_by_style("/@toad/style/src/app.css").is_none());
        assert!(registry.find_by_code("/@toad/module/src/app.tsx").is_none());
        assert!(registry.is_empty());

        let result = registry.upsert(draft(0, None));
        assert_eq!(result.outcome, UpsertOutcome::Ignored);
    }

    #[test]
    fn test_entries_fully_superseded() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(3, Some("three")));
        let _ = registry.upsert(draft(1, Some("one")));
        let record = registry.find_by_source("/src/app.tsx").unwrap();
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.compiled.as_deref(), Some("one"));
    }

    #[test]
    fn test_identical_sheet_not_invalidated() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(1, Some("same")));
        let result = registry.upsert(draft(1, Some("same")));
        assert!(result.invalidated.is_empty());
    }

    #[test]
    fn test_extension_change_moves_style_id() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(1, Some("sheet")));
        let mut scss = draft(1, Some("sheet"));
        scss.extension = ".scss".into();
        let result = registry.upsert(scss);
        assert_eq!(
            result.invalidated,
            ["/@toad/style/src/app.css", "/@toad/style/src/app.scss"]
        );
        assert!(registry.find_by_style("/@toad/style/src/app.css").is_none());
        assert!(registry.find_by_style("/@toad/style/src/app.scss").is_some());
    }

    #[test]
    fn test_pending_keeps_previous_sheet() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(1, Some("old")));
        let result = registry.upsert(draft(1, None));
        assert!(result.invalidated.is_empty());
        let record = registry.find_by_source("/src/app.tsx").unwrap();
        assert_eq!(record.state, StyleState::Pending);
        assert_eq!(record.compiled.as_deref(), Some("old"));
    }

    #[test]
    fn test_finalize_checks_generation() {
        let mut registry = ModuleRegistry::new();
        let UpsertOutcome::Stored { generation: first } = registry.upsert(draft(1, None)).outcome
        else {
            panic!("expected stored");
        };
        assert!(registry.begin_evaluation("/src/app.tsx", first));
        let UpsertOutcome::Stored { generation: second } = registry.upsert(draft(2, None)).outcome
        else {
            panic!("expected stored");
        };
        assert!(!registry.begin_evaluation("/src/app.tsx", first));

        let stale = registry.finalize("/src/app.tsx", first, Vec::new(), "late".into());
        assert_eq!(stale, Finalize::Stale);

        let applied = registry.finalize(
            "/src/app.tsx",
            second,
            vec![StyleEntry::new("id0", "a: 1;", false)],
            ".id0 { a: 1; }".into(),
        );
        assert_eq!(
            applied,
            Finalize::Applied {
                invalidated: vec!["/@toad/style/src/app.css".into()]
            }
        );
        let record = registry.find_by_source("/src/app.tsx").unwrap();
        assert_eq!(record.state, StyleState::Resolved);
        assert_eq!(record.entries.len(), 1);
    }

    #[test]
    fn test_shared_style_id_survives_removal() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(1, Some("tsx")));
        let mut ts = draft(1, Some("ts"));
        ts.source_id = "/src/app.ts".into();
        let result = registry.upsert(ts);
        assert_eq!(result.conflict.as_deref(), Some("/src/app.tsx"));

        assert!(registry.remove("/src/app.ts").is_some());
        let record = registry.find_by_style("/@toad/style/src/app.css").unwrap();
        assert_eq!(record.source_id, "/src/app.tsx");
        assert!(registry.find_by_code("/@toad/module/src/app.tsx").is_some());

        assert!(registry.remove("/src/app.tsx").is_some());
        assert!(registry.find_by_style("/@toad/style/src/app.css").is_none());
    }

    #[test]
    fn test_reupsert_same_source_is_not_a_conflict() {
        let mut registry = ModuleRegistry::new();
        let _ = registry.upsert(draft(1, Some("one")));
        let result = registry.upsert(draft(1, Some("two")));
        assert!(result.conflict.is_none());
    }

    #[test]
    fn test_finalize_after_removal_is_stale() {
        let mut registry = ModuleRegistry::new();
        let UpsertOutcome::Stored { generation } = registry.upsert(draft(1, None)).outcome else {
            panic!("expected stored");
        };
        let _ = registry.upsert(draft(0, None));
        assert_eq!(
            registry.finalize("/src/app.tsx", generation, Vec::new(), String::new()),
            Finalize::Stale
        );
    }
}
