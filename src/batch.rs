//! Batch entry point: convert one archive or a whole directory tree.
//!
//! A single file is converted straight into the destination directory. A
//! directory is walked in file-name order; every subdirectory is mirrored
//! under the destination and every comic archive found is converted into its
//! mirrored directory.
//!
//! ```text
//! library/                      out/
//! ├── Saga/                     ├── Saga/
//! │   ├── Vol 1.cbz      ──►    │   ├── Vol 1[resized].cbt
//! │   └── Vol 2.cbr      ──►    │   └── Vol 2[resized].cbt
//! └── notes.txt                 (ignored)
//! ```
//!
//! Inside a walk, an archive that fails as a whole is logged and counted and
//! the walk moves on. Failing to create a mirrored directory stops the walk.

use crate::convert::{ArchiveConverter, ConvertConfig, ConvertError, ConvertEvent, ConvertSummary};
use crate::imaging::{ImageCodec, RustCodec};
use crate::naming::{is_comic_archive, output_archive_name};
use log::error;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("source is neither a file nor a directory: {0}")]
    InvalidSource(PathBuf),
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Totals over every archive touched by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Archives converted successfully.
    pub archives: usize,
    /// Archives that failed as a whole.
    pub failed_archives: Vec<PathBuf>,
    pub entries_converted: usize,
    pub entries_failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn absorb(&mut self, summary: &ConvertSummary) {
        self.archives += 1;
        self.entries_converted += summary.converted;
        self.entries_failed += summary.failed;
    }
}

/// Where output goes when no destination is given: next to the source.
pub fn default_dest_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Path of the converted archive for `archive` inside `dest_dir`.
pub fn output_path(archive: &Path, dest_dir: &Path) -> PathBuf {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest_dir.join(output_archive_name(&file_name))
}

/// Convert `source` (an archive or a directory of archives) into `dest_dir`.
pub fn convert_path(
    source: &Path,
    dest_dir: &Path,
    config: &ConvertConfig,
    events: Option<Sender<ConvertEvent>>,
) -> Result<BatchSummary, BatchError> {
    let codec = RustCodec::new();
    convert_path_with_codec(&codec, source, dest_dir, config, events)
}

/// Convert using a specific codec (allows testing with mock).
pub fn convert_path_with_codec(
    codec: &(impl ImageCodec + ?Sized),
    source: &Path,
    dest_dir: &Path,
    config: &ConvertConfig,
    events: Option<Sender<ConvertEvent>>,
) -> Result<BatchSummary, BatchError> {
    let start = Instant::now();
    let mut converter = ArchiveConverter::new(codec, config);
    if let Some(tx) = events.as_ref() {
        converter = converter.with_events(tx);
    }

    let mut summary = if source.is_file() {
        create_dir(dest_dir)?;
        let result = convert_one(&converter, source, &output_path(source, dest_dir), events.as_ref())?;
        let mut summary = BatchSummary::default();
        summary.absorb(&result);
        summary
    } else if source.is_dir() {
        create_dir(dest_dir)?;
        walk(&converter, source, dest_dir, events.as_ref())?
    } else {
        return Err(BatchError::InvalidSource(source.to_path_buf()));
    };

    summary.elapsed = start.elapsed();
    Ok(summary)
}

fn create_dir(path: &Path) -> Result<(), BatchError> {
    std::fs::create_dir_all(path).map_err(|source| BatchError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert one archive, logging and reporting a failure with the time it took.
fn convert_one<C: ImageCodec + ?Sized>(
    converter: &ArchiveConverter<'_, C>,
    source: &Path,
    dest: &Path,
    events: Option<&Sender<ConvertEvent>>,
) -> Result<ConvertSummary, ConvertError> {
    let start = Instant::now();
    converter.convert(source, dest).inspect_err(|e| {
        let elapsed = start.elapsed();
        error!(
            "convert failed after {elapsed:.2?}: {}: {e}",
            source.display()
        );
        if let Some(tx) = events {
            let _ = tx.send(ConvertEvent::ArchiveFailed {
                source: source.to_path_buf(),
                reason: e.to_string(),
                elapsed,
            });
        }
    })
}

fn walk<C: ImageCodec + ?Sized>(
    converter: &ArchiveConverter<'_, C>,
    root: &Path,
    dest_dir: &Path,
    events: Option<&Sender<ConvertEvent>>,
) -> Result<BatchSummary, BatchError> {
    let mut summary = BatchSummary::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };

        if entry.file_type().is_dir() {
            if !rel.as_os_str().is_empty() {
                create_dir(&dest_dir.join(rel))?;
            }
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || !is_comic_archive(&file_name) {
            continue;
        }

        let target_dir = match rel.parent() {
            Some(parent) => dest_dir.join(parent),
            None => dest_dir.to_path_buf(),
        };
        let dest = output_path(entry.path(), &target_dir);
        match convert_one(converter, entry.path(), &dest, events) {
            Ok(result) => summary.absorb(&result),
            Err(_) => summary.failed_archives.push(entry.path().to_path_buf()),
        }
    }

    Ok(summary)
}
