//! Hot-update propagation and client reconciliation.
//!
//! When a dependency of a virtual code module changes, the stylesheet of
//! the module's real source may change with it, so the real source is
//! marked dirty too. Clients report the hash of the stylesheet they were
//! served; a stale report triggers a js-update of the source module.

use std::path::Path;

use rustc_hash::FxHashSet;

use super::Pipeline;
use crate::debug;
use crate::reload::message::{ClientHashReport, HotMessage};

impl Pipeline {
    /// Extra source modules dirtied by a change to `file`.
    ///
    /// `modules` are the ids the host already considers affected. Returns
    /// `None` when no record is touched.
    pub fn handle_hot_update(&self, file: &Path, modules: &[String]) -> Option<Vec<String>> {
        let mut seeds: Vec<String> = self
            .host
            .modules_by_file(file)
            .into_iter()
            .map(|node| node.id)
            .collect();
        seeds.extend(modules.iter().cloned());

        let nodes: Vec<_> = seeds
            .iter()
            .map(|id| (id, self.host.module_by_id(id)))
            .collect();

        let registry = self.registry.lock();
        let mut seen = FxHashSet::default();
        let mut dirty = Vec::new();
        let mut mark = |id: &str| {
            if seen.insert(id.to_string()) {
                dirty.push(id.to_string());
            }
        };

        for (id, node) in &nodes {
            let importers = node.iter().flat_map(|n| n.importers.iter());
            for importer in importers {
                if let Some(record) = registry.find_by_code(importer) {
                    mark(&record.source_id);
                }
            }
            if let Some(record) = registry.find_by_code(id) {
                mark(&record.source_id);
            }
            if registry.find_by_source(id).is_some() {
                mark(id);
            }
        }

        if dirty.is_empty() {
            return None;
        }
        debug!("hmr"; "{} dirties {}", file.display(), dirty.join(", "));
        Some(dirty)
    }

    /// Compare a client's stylesheet hash with the current one and push a
    /// js-update of the source module when they differ.
    pub fn on_client_report(&self, report: &ClientHashReport) -> Option<HotMessage> {
        let source_id = {
            let registry = self.registry.lock();
            let record = registry.find_by_code(&report.id)?;
            let current = record
                .content_hash
                .map(|hash| hash.short())
                .unwrap_or_default();
            if current == report.hash {
                return None;
            }
            record.source_id.clone()
        };

        let node = self.host.module_by_id(&source_id)?;
        let message = HotMessage::js_update([node.id.as_str()], self.last_served());
        debug!("hmr"; "{} is stale on a client, updating", source_id);
        self.host.send(&message);
        Some(message)
    }
}
