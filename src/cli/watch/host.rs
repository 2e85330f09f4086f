//! Filesystem host for `toad watch`.
//!
//! The module graph holds one node per scanned source file, keyed by its
//! root-relative id. There is no JavaScript runtime: evaluation always
//! fails, so the pipeline must run with `ssr.eval` off.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::address;
use crate::host::{BoxFuture, HotChannel, ModuleGraph, ModuleNode, ServerRuntime};
use crate::reload::message::HotMessage;
use crate::reload::server::HotServer;
use crate::utils::path::resolve_relative;

pub(super) struct FsHost {
    nodes: Mutex<FxHashMap<String, ModuleNode>>,
    /// Ids invalidated since the last drain.
    invalidated: Mutex<Vec<String>>,
    channel: Arc<HotServer>,
}

impl FsHost {
    pub fn new(channel: Arc<HotServer>) -> Self {
        Self {
            nodes: Mutex::new(FxHashMap::default()),
            invalidated: Mutex::new(Vec::new()),
            channel,
        }
    }

    pub fn add_file(&self, id: &str, file: PathBuf) {
        self.nodes.lock().insert(
            id.to_string(),
            ModuleNode {
                id: id.to_string(),
                file: Some(file),
                importers: Vec::new(),
            },
        );
    }

    pub fn remove_file(&self, id: &str) {
        self.nodes.lock().remove(id);
    }

    /// Take the virtual stylesheet ids invalidated since the last call.
    pub fn take_invalidated_styles(&self) -> Vec<String> {
        let mut invalidated = self.invalidated.lock();
        let mut styles: Vec<String> = invalidated
            .drain(..)
            .filter(|id| address::is_virtual_style(id))
            .collect();
        styles.sort_unstable();
        styles.dedup();
        styles
    }
}

impl ModuleGraph for FsHost {
    fn module_by_id(&self, id: &str) -> Option<ModuleNode> {
        self.nodes.lock().get(id).cloned()
    }

    fn modules_by_file(&self, file: &Path) -> Vec<ModuleNode> {
        self.nodes
            .lock()
            .values()
            .filter(|node| node.file.as_deref() == Some(file))
            .cloned()
            .collect()
    }

    fn invalidate_module(&self, id: &str) {
        crate::debug!("watch"; "invalidate {}", id);
        self.invalidated.lock().push(id.to_string());
    }
}

impl ServerRuntime for FsHost {
    fn evaluate<'a>(&'a self, id: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move { Err(anyhow!("cannot evaluate {id}: watch mode has no runtime")) })
    }

    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        importer: &'a str,
    ) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move { resolve_relative(importer, specifier) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.channel.shutdown() })
    }
}

impl HotChannel for FsHost {
    fn send(&self, message: &HotMessage) {
        self.channel.broadcast(message);
    }
}
