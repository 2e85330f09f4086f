//! Contracts of the host bundler / dev-server.
//!
//! The pipeline never owns the module graph, the server-side runtime or the
//! notification channel. It reaches them through these traits, which a host
//! integration (or the filesystem host of `toad watch`) implements.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::reload::message::HotMessage;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A module as known to the host graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleNode {
    pub id: String,
    pub file: Option<PathBuf>,
    /// Ids of modules importing this one.
    pub importers: Vec<String>,
}

/// Host module graph.
pub trait ModuleGraph: Send + Sync {
    fn module_by_id(&self, id: &str) -> Option<ModuleNode>;

    fn modules_by_file(&self, file: &Path) -> Vec<ModuleNode>;

    /// Drop cached content of a module so the next fetch reloads it.
    fn invalidate_module(&self, id: &str);
}

/// Host server-side execution facility.
pub trait ServerRuntime: Send + Sync {
    /// Load and run a module in server-rendering mode, returning its export
    /// namespace as JSON.
    fn evaluate<'a>(&'a self, id: &'a str) -> BoxFuture<'a, anyhow::Result<Value>>;

    /// Resolve `specifier` as if imported from `importer`.
    fn resolve<'a>(&'a self, specifier: &'a str, importer: &'a str)
    -> BoxFuture<'a, Option<String>>;

    /// Shut down any auxiliary execution context.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Host hot-update notification channel.
pub trait HotChannel: Send + Sync {
    fn send(&self, message: &HotMessage);
}

/// Everything the pipeline needs from its host.
pub trait Host: ModuleGraph + ServerRuntime + HotChannel {}

impl<T: ModuleGraph + ServerRuntime + HotChannel> Host for T {}

/// One-shot callback run after the module it was registered for evaluates.
pub type EvaluatedCallback = Box<dyn FnOnce() + Send>;

/// Result of a caller-supplied server transform.
pub struct ServerTransformOutput {
    pub code: String,
    pub on_evaluated: Option<EvaluatedCallback>,
}

impl ServerTransformOutput {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            on_evaluated: None,
        }
    }

    pub fn with_callback(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_evaluated = Some(Box::new(callback));
        self
    }
}

/// Caller-supplied hook turning processed code into server-ready code.
///
/// `Ok(None)` declines; an error is logged and the module falls back to its
/// placeholder entries.
pub trait ServerTransform: Send + Sync {
    fn transform<'a>(
        &'a self,
        code: &'a str,
        source_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<ServerTransformOutput>>>;
}

/// Caller predicate `(id, code)` deciding whether a file is processed at all.
pub type FileGate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;
