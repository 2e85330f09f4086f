//! `toad extract`: run the client pass over files without a host.
//!
//! Files are processed in parallel. With `--out`, rewritten sources and
//! their stylesheets are written under the output directory, mirroring the
//! root-relative layout; otherwise both are printed to stdout.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;

use crate::address::{self, STYLE_PREFIX};
use crate::config::{Command, ToadConfig};
use crate::diagnostics::Diagnostics;
use crate::extract::{self, ExtractStrategy, SourceFile};
use crate::ident::DefaultClassNamer;
use crate::logger::ProgressLine;
use crate::stylesheet::{DefaultRenderer, MinifyingRenderer, StyleRenderer};
use crate::utils::path::normalize_path;
use crate::{debug, log};

/// Result for one processed file.
struct FileOutput {
    id: String,
    rewritten: String,
    /// `(virtual style id, sheet)`, absent when the file has no templates.
    sheet: Option<(String, String)>,
    templates: usize,
}

struct Extractor<'a> {
    config: &'a ToadConfig,
    strategy: Box<dyn ExtractStrategy>,
    renderer: Box<dyn StyleRenderer>,
    diagnostics: &'a Diagnostics,
}

pub fn run(mut config: ToadConfig, files: &[PathBuf], out: Option<&Path>) -> Result<()> {
    config.command = Command::Build;
    config.root = normalize_path(&config.root);

    let diagnostics = Diagnostics::new();
    let extractor = Extractor {
        strategy: extract::strategy(&config, Arc::new(DefaultClassNamer))?,
        renderer: if config.minify {
            Box::new(MinifyingRenderer::new(DefaultRenderer))
        } else {
            Box::new(DefaultRenderer)
        },
        config: &config,
        diagnostics: &diagnostics,
    };
    let filter = config.source_filter()?;

    let progress = ProgressLine::new(&[("files", files.len())]);
    let results: Vec<(&PathBuf, Result<Option<FileOutput>>)> = files
        .par_iter()
        .map(|path| {
            let id = config.root_relative_id(&normalize_path(path));
            let result = if filter.matches(&id) {
                extractor.extract_file(path, id)
            } else {
                debug!("extract"; "{} filtered out", id);
                Ok(None)
            };
            progress.inc("files");
            (path, result)
        })
        .collect();
    progress.finish();

    let mut failed = 0usize;
    let mut templates = 0usize;
    for (path, result) in results {
        match result {
            Ok(Some(output)) => {
                templates += output.templates;
                emit(&output, out)?;
            }
            Ok(None) => {}
            Err(err) => {
                failed += 1;
                log!("error"; "{}: {:#}", path.display(), err);
            }
        }
    }

    log!(
        "extract";
        "{} files, {} templates, {} warnings",
        files.len() - failed,
        templates,
        diagnostics.all().len()
    );
    if failed > 0 {
        bail!("{failed} file(s) failed");
    }
    Ok(())
}

impl Extractor<'_> {
    fn extract_file(&self, path: &Path, id: String) -> Result<Option<FileOutput>> {
        let code = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let relative = id.clone();
        let extraction = match self.strategy.extract(&SourceFile::new(&id, &relative, &code)) {
            Ok(extraction) => extraction,
            Err(err) => {
                self.diagnostics.warn(&id, err.to_string());
                return Ok(None);
            }
        };
        for warning in &extraction.warnings {
            self.diagnostics.warn(&id, warning.to_string());
        }

        let sheet = (!extraction.entries.is_empty()).then(|| {
            let extension = extraction
                .output_extension
                .as_deref()
                .unwrap_or(&self.config.output_extension);
            (
                address::virtual_style_id(&id, extension),
                self.renderer.render(&extraction.entries),
            )
        });

        Ok(Some(FileOutput {
            templates: extraction.entries.len(),
            rewritten: extraction.rewritten,
            sheet,
            id,
        }))
    }
}

/// Write or print one file's output.
fn emit(output: &FileOutput, out: Option<&Path>) -> Result<()> {
    let Some(out) = out else {
        println!("// {}\n{}", output.id, output.rewritten);
        if let Some((style_id, sheet)) = &output.sheet {
            println!("/* {} */{}", style_id, sheet);
        }
        return Ok(());
    };

    write_file(&out.join(output.id.trim_start_matches('/')), &output.rewritten)?;
    if let Some((style_id, sheet)) = &output.sheet {
        let relative = style_id.strip_prefix(STYLE_PREFIX).unwrap_or(style_id);
        write_file(&out.join(relative), sheet)?;
    }
    Ok(())
}

pub(super) fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
