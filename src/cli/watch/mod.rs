//! `toad watch`: keep virtual stylesheets on disk in sync with sources.
//!
//! ```text
//! notify ─► Debouncer ─► Pipeline::transform_client ─► <out_dir>/<style path>
//!                                   │                        │
//!                        invalidated style ids ──────► css-update broadcast
//!
//! ws client ── @toad:hmr ──► Pipeline::on_client_report ──► js-update
//! ```
//!
//! The watcher is attached before the initial scan so no change made
//! during the scan is lost.

mod debouncer;
mod host;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use jwalk::WalkDir;
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use tokio::sync::{Notify, mpsc};

use self::debouncer::{ChangeKind, Debouncer};
use self::host::FsHost;
use super::extract::write_file;
use crate::address::STYLE_PREFIX;
use crate::config::{Command, SourceFilter, ToadConfig};
use crate::diagnostics::Severity;
use crate::host::HotChannel;
use crate::logger::{status_success, status_unchanged, status_warning};
use crate::pipeline::Pipeline;
use crate::reload::message::{ClientHashReport, HotMessage};
use crate::reload::server::HotServer;
use crate::utils::path::{id_to_path, normalize_path};
use crate::{debug, log};

pub fn run(config: ToadConfig, dir: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let (report_tx, report_rx) = crossbeam::channel::unbounded();
    let port = port.unwrap_or(config.watch.ws_port);
    let channel = HotServer::start(port, report_tx)?;
    log!("watch"; "notification channel on ws://127.0.0.1:{}", channel.port());

    let session = Session::new(config, dir, channel)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()?;
    runtime.block_on(session.run(report_rx))
}

struct Session {
    pipeline: Pipeline,
    host: Arc<FsHost>,
    filter: SourceFilter,
    watch_dir: PathBuf,
    out_dir: PathBuf,
}

impl Session {
    fn new(mut config: ToadConfig, dir: Option<PathBuf>, channel: Arc<HotServer>) -> Result<Self> {
        config.command = Command::Serve;
        config.root = normalize_path(&config.root);
        if config.ssr.eval {
            log!("watch"; "server evaluation needs a dev-server runtime, disabled");
            config.ssr.eval = false;
        }

        let watch_dir = dir.map_or_else(|| config.root.clone(), |dir| normalize_path(&dir));
        let out_dir = config.root.join(&config.watch.out_dir);
        let filter = config.source_filter()?;
        let host = Arc::new(FsHost::new(channel));
        let pipeline = Pipeline::new(config, host.clone())?;

        Ok(Self {
            pipeline,
            host,
            filter,
            watch_dir,
            out_dir,
        })
    }

    async fn run(self, reports: crossbeam::channel::Receiver<ClientHashReport>) -> Result<()> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&self.watch_dir, RecursiveMode::Recursive)?;

        self.pipeline.init();
        self.initial_scan().await;

        // sync -> async bridges
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });
        let (report_async_tx, mut report_async_rx) = mpsc::channel::<ClientHashReport>(64);
        std::thread::spawn(move || {
            while let Ok(report) = reports.recv() {
                if report_async_tx.blocking_send(report).is_err() {
                    break;
                }
            }
        });

        let shutdown = Arc::new(Notify::new());
        let on_signal = Arc::clone(&shutdown);
        ctrlc::set_handler(move || on_signal.notify_one())
            .map_err(|e| anyhow!("failed to set Ctrl+C handler: {}", e))?;

        let mut debouncer = Debouncer::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                Some(event) = event_rx.recv() => debouncer.add_event(&event),
                Some(report) = report_async_rx.recv() => {
                    self.pipeline.on_client_report(&report);
                }
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if let Some(changes) = debouncer.take_if_ready() {
                        self.apply(changes).await;
                    }
                }
            }
        }

        log!("watch"; "shutting down...");
        drop(watcher);
        self.pipeline.teardown().await;
        Ok(())
    }

    async fn initial_scan(&self) {
        let files: Vec<PathBuf> = WalkDir::new(&self.watch_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|path| !path.starts_with(&self.out_dir))
            .collect();

        let mut styled = 0usize;
        for path in &files {
            if self.process(path).await {
                styled += 1;
            }
        }
        self.flush_styles(false);
        log!(
            "watch";
            "watching {} ({} files, {} with styles)",
            self.watch_dir.display(),
            files.len(),
            styled
        );
    }

    /// Run the client pass for one file. Returns whether it has styles.
    async fn process(&self, path: &Path) -> bool {
        let id = self.pipeline.config().root_relative_id(path);
        if !self.filter.matches(&id) {
            return false;
        }
        let code = match fs::read_to_string(path) {
            Ok(code) => code,
            Err(e) => {
                log!("watch"; "failed to read {}: {}", path.display(), e);
                return false;
            }
        };
        self.host.add_file(&id, path.to_path_buf());
        self.pipeline
            .transform_client(&code, &id, false)
            .await
            .is_some_and(|output| output.style_id.is_some())
    }

    async fn apply(&self, changes: FxHashMap<PathBuf, ChangeKind>) {
        let mut seen: Vec<String> = Vec::new();
        for (path, kind) in changes {
            if path.starts_with(&self.out_dir) {
                continue;
            }
            let id = self.pipeline.config().root_relative_id(&path);
            debug!("watch"; "{} {}", kind.label(), id);
            match kind {
                ChangeKind::Removed => {
                    self.pipeline.forget(&id);
                    self.host.remove_file(&id);
                }
                ChangeKind::Created | ChangeKind::Modified => {
                    self.process(&path).await;
                }
            }

            let dirty = self
                .pipeline
                .handle_hot_update(&path, std::slice::from_ref(&id))
                .unwrap_or_default();
            for source in dirty {
                if source != id && !seen.contains(&source) {
                    self.process(&id_to_path(&self.pipeline.config().root, &source))
                        .await;
                    seen.push(source);
                }
            }
            seen.push(id);
        }

        let updated = self.flush_styles(true);
        let errors = self
            .pipeline
            .diagnostics()
            .take()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        if errors > 0 {
            status_warning(&format!("{errors} module(s) failed, see log above"));
        } else if updated > 0 {
            status_success(&format!("{updated} stylesheet(s) updated"));
        } else {
            status_unchanged("no stylesheet changed");
        }
    }

    /// Write or delete the sheets of invalidated style ids. Returns how many
    /// were touched.
    fn flush_styles(&self, notify: bool) -> usize {
        let styles = self.host.take_invalidated_styles();
        for style_id in &styles {
            let relative = style_id.strip_prefix(STYLE_PREFIX).unwrap_or(style_id);
            let target = self.out_dir.join(relative);
            match self.pipeline.load(style_id) {
                Some(sheet) => {
                    if let Err(e) = write_file(&target, &sheet) {
                        log!("watch"; "{:#}", e);
                    }
                }
                None => {
                    if let Err(e) = fs::remove_file(&target)
                        && e.kind() != std::io::ErrorKind::NotFound
                    {
                        log!("watch"; "failed to remove {}: {}", target.display(), e);
                    }
                }
            }
        }

        if notify && !styles.is_empty() {
            let message = HotMessage::css_update(styles.iter().cloned(), self.pipeline.last_served());
            self.host.send(&message);
        }
        styles.len()
    }
}
