use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::anyhow;
use serde::Serialize;
use srcstore_ingest::{default_repository_root, StoreConfig};
use srcstore_store::{Durability, Repository};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(args, format),
        Command::AddSourceFile(args) => cmd_add_source_file(args, format),
        Command::Md5sum(args) => {
            let mut out = Emitter::new(format);
            let result = srcstore_ingest::md5sum(&args.paths, |item| out.emit(item));
            out.finish(result)
        }
        Command::ListSourceFiles(args) => {
            let mut out = Emitter::new(format);
            let result = srcstore_ingest::list_sources(&args.executables, |item| out.emit(item));
            out.finish(result)
        }
    }
}

#[derive(Serialize)]
struct Initialized {
    root: PathBuf,
}

fn cmd_init(args: InitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => {
            let root = default_repository_root()?;
            // $XDG_CACHE_HOME itself may not exist yet.
            if let Some(parent) = root.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("mkdir {}: {e}", parent.display()))?;
            }
            root
        }
    };
    let repo = Repository::initialize(&root)?;
    debug!(root = %repo.root().display(), "initialized repository");

    if format == OutputFormat::Json {
        let root = repo.root().to_path_buf();
        emit_json(&[Initialized { root }])?;
    }
    Ok(())
}

fn cmd_add_source_file(args: AddSourceFileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let root = default_repository_root()?;
    let mut config = StoreConfig::load(&root)?.store;
    if args.fsync {
        config.durability = Durability::Fsync;
    }
    let repo = Repository::open_with_config(&root, config)?;

    let mut added = Vec::new();
    let result = srcstore_ingest::add_sources(&repo, &args.paths, |item| {
        if format == OutputFormat::Json {
            added.push(item);
        }
        Ok(())
    });
    if format == OutputFormat::Json {
        emit_json(&added)?;
    }
    Ok(result?)
}

/// Text lines go out as each item arrives. JSON is held back and written
/// as one array, covering whatever arrived before a failure.
struct Emitter<T> {
    format: OutputFormat,
    pending: Vec<T>,
}

impl<T: Serialize + Display> Emitter<T> {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            pending: Vec::new(),
        }
    }

    fn emit(&mut self, item: T) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.pending.push(item);
                Ok(())
            }
            OutputFormat::Text => {
                let mut out = io::stdout().lock();
                writeln!(out, "{item}")?;
                out.flush()
            }
        }
    }

    /// Flush held-back output, then report the flow's own result. The
    /// flow's error wins over an output error.
    fn finish(self, result: srcstore_ingest::IngestResult<()>) -> anyhow::Result<()> {
        let written = match self.format {
            OutputFormat::Json => emit_json(&self.pending),
            OutputFormat::Text => Ok(()),
        };
        result?;
        written
    }
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
