//! Plugin pipeline: the hooks a host calls for every module request.
//!
//! # Flow
//!
//! ```text
//! transform(code, id)
//!   └─ extract ──► registry.upsert ──► invalidate stale style ids
//!        │
//!        ├─ ssr.eval off: sheet rendered from client entries
//!        └─ ssr.eval on:  evaluate virtual code module ─► finalize sheet
//!                             └─ host loads /@toad/module/<id>
//!                                  └─ transform(ssr) appends __TOAD__ export
//!
//! load(/@toad/style/<id>.css)  ─► compiled sheet ("" while pending)
//! ```
//!
//! # Modules
//!
//! - `coordinator` - per-module serialization of server evaluations
//! - `hot` - hot-update propagation and client hash reconciliation
//! - `snippet` - client code reporting its stylesheet hash

mod coordinator;
mod hot;
mod snippet;


use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use self::coordinator::{Coordinator, Evaluation};
use crate::address::{self, Request};
use crate::config::{ConfigError, SourceFilter, ToadConfig};
use crate::diagnostics::Diagnostics;
use crate::entry::StyleEntry;
use crate::export;
use crate::extract::{self, ExtractStrategy, SourceFile, js_string};
use crate::host::{FileGate, Host, ServerTransform};
use crate::ident::{ClassNamer, DefaultClassNamer};
use crate::registry::{Finalize, ModuleRegistry, RecordDraft, UpsertOutcome, VirtualModuleRecord};
use crate::reload::message::now_millis;
use crate::stylesheet::{DefaultRenderer, MinifyingRenderer, StyleRenderer};
use crate::utils::hash::ContentHash;
use crate::{debug, log};

/// Client-facing result of transforming a source module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    /// Virtual stylesheet imported by `code`, absent when the module has no
    /// templates left.
    pub style_id: Option<String>,
    pub content_hash: Option<ContentHash>,
}

pub struct Pipeline {
    config: Arc<ToadConfig>,
    host: Arc<dyn Host>,
    registry: Mutex<ModuleRegistry>,
    extractor: Box<dyn ExtractStrategy>,
    /// Extractor of the server pass; merges attributes only with `ssr.merge_attributes`.
    server_extractor: Box<dyn ExtractStrategy>,
    renderer: Arc<dyn StyleRenderer>,
    server_transform: Option<Arc<dyn ServerTransform>>,
    file_gate: Option<FileGate>,
    filter: SourceFilter,
    coordinator: Coordinator,
    diagnostics: Diagnostics,
    /// Milliseconds since the epoch of the last stylesheet served.
    last_served: AtomicU64,
    running: AtomicBool,
}

impl Pipeline {
    pub fn new(config: ToadConfig, host: Arc<dyn Host>) -> Result<Self, ConfigError> {
        config.validate()?;

        let (extractor, server_extractor) = extractors(&config, Arc::new(DefaultClassNamer))?;

        let renderer: Arc<dyn StyleRenderer> = if config.minify {
            Arc::new(MinifyingRenderer::new(DefaultRenderer))
        } else {
            Arc::new(DefaultRenderer)
        };

        Ok(Self {
            filter: config.source_filter()?,
            config: Arc::new(config),
            host,
            registry: Mutex::new(ModuleRegistry::new()),
            extractor,
            server_extractor,
            renderer,
            server_transform: None,
            file_gate: None,
            coordinator: Coordinator::default(),
            diagnostics: Diagnostics::new(),
            last_served: AtomicU64::new(now_millis()),
            running: AtomicBool::new(false),
        })
    }

    /// Name classes with `namer` in both passes.
    pub fn with_class_namer(mut self, namer: impl ClassNamer + 'static) -> Result<Self, ConfigError> {
        (self.extractor, self.server_extractor) = extractors(&self.config, Arc::new(namer))?;
        Ok(self)
    }

    /// Replace the stylesheet renderer.
    pub fn with_renderer(mut self, renderer: impl StyleRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Install a hook producing server-ready code for the server pass.
    pub fn with_server_transform(mut self, hook: impl ServerTransform + 'static) -> Self {
        self.server_transform = Some(Arc::new(hook));
        self
    }

    /// Install a predicate deciding whether a file is processed at all.
    pub fn with_file_gate(
        mut self,
        gate: impl Fn(&str, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.file_gate = Some(Arc::new(gate));
        self
    }

    pub fn config(&self) -> &ToadConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Snapshot of the record for a source id.
    pub fn record(&self, source_id: &str) -> Option<VirtualModuleRecord> {
        self.registry.lock().find_by_source(source_id).cloned()
    }

    /// Snapshot of every record.
    pub fn records(&self) -> Vec<VirtualModuleRecord> {
        self.registry.lock().records().cloned().collect()
    }

    pub fn last_served(&self) -> u64 {
        self.last_served.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // lifecycle
    // ========================================================================

    pub fn init(&self) {
        self.running.store(true, Ordering::SeqCst);
        debug!(
            "toad";
            "pipeline started (mode {:?}, eval {})",
            self.config.mode,
            self.config.ssr.eval
        );
    }

    /// Drop all records and close the host's auxiliary execution context.
    pub async fn teardown(&self) {
        self.log_summary();
        self.registry.lock().clear();
        self.coordinator.clear();
        self.host.close().await;
        self.running.store(false, Ordering::SeqCst);
        debug!("toad"; "pipeline stopped");
    }

    // ========================================================================
    // resolve / load
    // ========================================================================

    /// Claim virtual ids that have a backing record.
    pub fn resolve_id(&self, url: &str) -> Option<String> {
        let request = Request::parse(url);
        if request.is_skipped() || !address::is_virtual(request.id) {
            return None;
        }
        let registry = self.registry.lock();
        let known = if address::is_virtual_style(request.id) {
            registry.find_by_style(request.id).is_some()
        } else {
            registry.find_by_code(request.id).is_some()
        };
        known.then(|| request.id.to_string())
    }

    /// Resolve an import issued from a virtual code module against its real
    /// source module.
    pub async fn resolve_server_import(&self, specifier: &str, importer: &str) -> Option<String> {
        let importer = Request::parse(importer).id;
        if !address::is_virtual_module(importer) {
            return None;
        }
        let source_id = self
            .registry
            .lock()
            .find_by_code(importer)
            .map(|record| record.source_id.clone());
        let Some(source_id) = source_id else {
            self.diagnostics.error(
                importer,
                format!("can't find source module to resolve `{specifier}`"),
            );
            return None;
        };
        self.host.resolve(specifier, &source_id).await
    }

    /// Serve virtual modules.
    ///
    /// A style id without record answers `None`; a pending sheet answers an
    /// empty string.
    pub fn load(&self, url: &str) -> Option<String> {
        let request = Request::parse(url);
        if request.is_skipped() || !address::is_virtual(request.id) {
            return None;
        }

        let registry = self.registry.lock();
        if address::is_virtual_style(request.id) {
            let record = registry.find_by_style(request.id)?;
            return Some(match &record.compiled {
                Some(sheet) => {
                    self.last_served.store(now_millis(), Ordering::SeqCst);
                    sheet.clone()
                }
                None => String::new(),
            });
        }

        if self.config.ssr.eval {
            return registry
                .find_by_code(request.id)
                .map(|record| record.source_code.clone());
        }
        None
    }

    // ========================================================================
    // transform
    // ========================================================================

    /// Transform hook: the server pass for virtual code modules under `ssr`,
    /// the client pass otherwise.
    pub async fn transform(&self, code: &str, url: &str, ssr: bool) -> Option<String> {
        if ssr && address::is_virtual_module(Request::parse(url).id) {
            return self.transform_server(code, url).await;
        }
        self.transform_client(code, url, ssr)
            .await
            .map(|output| output.code)
    }

    /// Extract a real source module, store its record and, with `ssr.eval`,
    /// resolve its entries through the server pass.
    pub async fn transform_client(&self, code: &str, url: &str, ssr: bool) -> Option<TransformOutput> {
        let request = Request::parse(url);
        let id = request.id;
        if request.is_skipped() || address::is_virtual(id) || !self.filter.matches(id) {
            return None;
        }
        if let Some(gate) = &self.file_gate
            && !gate(id, code)
        {
            debug!("toad"; "file gate skipped {}", id);
            return None;
        }

        if ssr && self.coordinator.is_evaluating(id) {
            debug!("toad"; "{} imported during its own evaluation", id);
            return self.current_output(id);
        }

        let relative = self.config.root_relative_id(Path::new(id));
        let extraction = match self.extractor.extract(&SourceFile::new(id, &relative, code)) {
            Ok(extraction) => extraction,
            Err(err) => {
                self.diagnostics.warn(id, err.to_string());
                return None;
            }
        };
        for warning in &extraction.warnings {
            self.diagnostics.warn(id, warning.to_string());
        }

        let eval = self.config.ssr.eval;
        let client_entries = extraction.entries.clone();
        let extension = extraction
            .output_extension
            .clone()
            .unwrap_or_else(|| self.config.output_extension.clone());

        let upsert = self.registry.lock().upsert(RecordDraft {
            source_id: id.to_string(),
            source_code: code.to_string(),
            rewritten_code: extraction.rewritten.clone(),
            entries: extraction.entries,
            extension: extension.clone(),
            compiled: (!eval).then(|| self.renderer.render(&client_entries)),
        });
        self.invalidate(&upsert.invalidated);
        if let Some(other) = &upsert.conflict {
            self.diagnostics.warn(
                id,
                format!(
                    "stylesheet {} is also generated by {}",
                    address::virtual_style_id(id, &extension),
                    other
                ),
            );
        }

        let generation = match upsert.outcome {
            UpsertOutcome::Stored { generation } => generation,
            UpsertOutcome::Removed | UpsertOutcome::Ignored => {
                if upsert.outcome == UpsertOutcome::Removed {
                    debug!("toad"; "{} has no templates left, record removed", id);
                }
                return (extraction.rewritten != code).then(|| TransformOutput {
                    code: extraction.rewritten,
                    style_id: None,
                    content_hash: None,
                });
            }
        };

        if eval {
            match self.evaluate(id, generation).await {
                Evaluation::Resolved(entries) => self.finish(id, generation, entries),
                Evaluation::Fallback => self.finish(id, generation, client_entries),
                Evaluation::Superseded => {
                    debug!("toad"; "{} was edited during evaluation, result dropped", id);
                }
            }
        }

        let style_id = address::virtual_style_id(id, &extension);
        let content_hash = self
            .registry
            .lock()
            .find_by_style(&style_id)
            .and_then(|record| record.content_hash);

        let mut code = format!("import {};\n", js_string(&style_id));
        code.push_str(&extraction.rewritten);
        if self.config.is_serve() && !ssr {
            let hash = content_hash.map(ContentHash::short).unwrap_or_default();
            code.push_str(&snippet::hmr_snippet(&address::virtual_module_id(id), &hash));
        }

        Some(TransformOutput {
            code,
            style_id: Some(style_id),
            content_hash,
        })
    }

    /// Produce the server variant of a virtual code module: the rewritten
    /// source plus the `__TOAD__` export, passed through the custom hook.
    pub async fn transform_server(&self, code: &str, url: &str) -> Option<String> {
        let id = Request::parse(url).id;
        if !address::is_virtual_module(id) {
            return None;
        }
        let source_id = self
            .registry
            .lock()
            .find_by_code(id)
            .map(|record| record.source_id.clone());
        let Some(source_id) = source_id else {
            debug!("toad"; "no record behind {}", id);
            return None;
        };

        let relative = self.config.root_relative_id(Path::new(&source_id));
        let source = SourceFile::new(&source_id, &relative, code);
        let extraction = match self.server_extractor.extract(&source) {
            Ok(extraction) => extraction,
            Err(err) => {
                self.diagnostics
                    .error(&source_id, format!("server transform failed: {err}"));
                self.coordinator.mark_degraded(&source_id);
                return None;
            }
        };
        let mut target = export::append_export(&extraction.rewritten, &extraction.entries);

        if let Some(hook) = &self.server_transform {
            match hook.transform(&target, &source_id).await {
                Ok(Some(output)) => {
                    if let Some(callback) = output.on_evaluated {
                        self.coordinator.set_callback(&source_id, callback);
                    }
                    target = output.code;
                }
                Ok(None) => debug!("toad"; "custom server transform declined {}", source_id),
                Err(err) => {
                    self.diagnostics.error(
                        &source_id,
                        format!("custom server transform failed: {err:#}"),
                    );
                    self.coordinator.mark_degraded(&source_id);
                }
            }
        }

        Some(target)
    }

    /// Drop the record of a deleted source file.
    pub fn forget(&self, source_id: &str) {
        let removed = self.registry.lock().remove(source_id);
        if let Some(record) = removed {
            self.host.invalidate_module(&record.virtual_style_id);
            self.host.invalidate_module(&record.virtual_code_id);
            debug!("toad"; "forgot {}", source_id);
        }
        self.coordinator.forget(source_id);
    }

    // ========================================================================
    // helpers
    // ========================================================================

    fn finish(&self, source_id: &str, generation: u64, entries: Vec<StyleEntry>) {
        let sheet = self.renderer.render(&entries);
        let finalized = self
            .registry
            .lock()
            .finalize(source_id, generation, entries, sheet);
        match finalized {
            Finalize::Applied { invalidated } => self.invalidate(&invalidated),
            Finalize::Stale => debug!("toad"; "{} superseded before finalize", source_id),
        }
    }

    /// Server-side output of the stored record, without extracting again.
    fn current_output(&self, source_id: &str) -> Option<TransformOutput> {
        let registry = self.registry.lock();
        let record = registry.find_by_source(source_id)?;
        Some(TransformOutput {
            code: format!(
                "import {};\n{}",
                js_string(&record.virtual_style_id),
                record.rewritten_code
            ),
            style_id: Some(record.virtual_style_id.clone()),
            content_hash: record.content_hash,
        })
    }

    fn invalidate(&self, ids: &[String]) {
        for id in ids {
            self.host.invalidate_module(id);
        }
    }

    fn log_summary(&self) {
        let registry = self.registry.lock();
        let templates: usize = registry.records().map(|r| r.entries.len()).sum();
        log!("toad"; "{} modules, {} templates", registry.len(), templates);
    }
}

/// Client and server extractors. The server one merges attributes only with
/// `ssr.merge_attributes`.
fn extractors(
    config: &ToadConfig,
    namer: Arc<dyn ClassNamer>,
) -> Result<(Box<dyn ExtractStrategy>, Box<dyn ExtractStrategy>), ConfigError> {
    let client = extract::strategy(config, namer.clone())?;
    let mut server_config = config.clone();
    server_config.custom_attribute.enable =
        config.custom_attribute.enable && config.ssr.merge_attributes;
    let server = extract::strategy(&server_config, namer)?;
    Ok((client, server))
}
