//! Per-archive conversion pipeline.
//!
//! Takes one source comic archive and produces one tar archive in which every
//! page has been re-encoded (and downscaled when taller than the configured
//! cap). Non-image entries such as `ComicInfo.xml` are dropped.
//!
//! ## Flow
//!
//! ```text
//! open source ─► create destination (exclusive)
//!                      │
//!                      ▼
//!     ┌──── rayon::scope ─────────────────────────────┐
//!     │ read entry ─► image? ──no──► skipped          │
//!     │      ▲           │yes                         │
//!     │      │           ▼                            │
//!     │      │     spawn worker: decode ─► resize?    │
//!     │      │           ─► encode ─► append (locked) │
//!     │      └── next entry                           │
//!     └───────────────────────────────────────────────┘
//!                      │  (scope returns only after every worker)
//!                      ▼
//!                  finalize
//! ```
//!
//! Entries are read one at a time on the calling thread and handed to the
//! rayon pool as soon as they are in memory, so decoding of early pages
//! overlaps with reading later ones. The scope is the completion barrier: it
//! cannot return while a worker is still running, which means the tar trailer
//! is never written ahead of a page.
//!
//! ## Failure model
//!
//! A page that fails to decode, encode, or append is reported and left out of
//! the output; the rest of the archive still converts. Failing to open the
//! source, create the destination, read the source structure, or finalize the
//! output fails the whole archive. A structural read error still waits for the
//! pages already dispatched, then leaves the destination unfinalized.

use crate::archive::{
    ArchiveError, ArchiveSource, ArchiveWriter, EncodedRecord, SourceEntry, WriterError,
    open_archive,
};
use crate::config::Config;
use crate::imaging::{
    CodecError, EncodeParams, ImageCodec, Quality, ResizeDecision, decide_resize, scaled_width,
};
use crate::naming::{is_image, replace_suffix};
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A single page that could not be converted.
#[derive(Error, Debug)]
pub enum EntryError {
    #[error("{name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: CodecError,
    },
    #[error("{name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: CodecError,
    },
    #[error("{name}: {source}")]
    Append {
        name: String,
        #[source]
        source: WriterError,
    },
}

impl EntryError {
    /// Name of the source entry that failed.
    pub fn name(&self) -> &str {
        match self {
            Self::Decode { name, .. } | Self::Encode { name, .. } | Self::Append { name, .. } => {
                name
            }
        }
    }
}

/// Failure of a whole archive.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: WriterError,
    },
    #[error("error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
    #[error("cannot finalize {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: WriterError,
    },
}

/// Settings applied to every page of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertConfig {
    pub quality: Quality,
    pub max_height: u32,
}

impl ConvertConfig {
    /// Build a ConvertConfig from loaded config values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            quality: Quality::new(config.images.quality),
            max_height: config.images.max_height,
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Progress events emitted while converting.
///
/// Sent through an optional channel so the caller can display progress as it
/// happens. The library itself never prints.
#[derive(Debug, Clone)]
pub enum ConvertEvent {
    ArchiveStarted {
        source: PathBuf,
        dest: PathBuf,
    },
    EntryConverted {
        name: String,
        output_name: String,
        /// Decoded dimensions (width, height).
        original: (u32, u32),
        /// Output dimensions, when the page was downscaled.
        resized_to: Option<(u32, u32)>,
    },
    EntrySkipped {
        name: String,
    },
    EntryFailed {
        name: String,
        reason: String,
    },
    ArchiveFinished {
        source: PathBuf,
        dest: PathBuf,
        summary: ConvertSummary,
    },
    /// Emitted by the batch layer when an archive fails as a whole.
    ArchiveFailed {
        source: PathBuf,
        reason: String,
        /// Time spent on the archive before it failed.
        elapsed: Duration,
    },
}

/// Outcome of one archive conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Pages written to the output.
    pub converted: usize,
    /// Of `converted`, pages that were downscaled.
    pub resized: usize,
    /// Non-image entries left out.
    pub skipped: usize,
    /// Pages that failed to convert.
    pub failed: usize,
    /// Source names of the failed pages, in completion order.
    pub failed_names: Vec<String>,
    pub elapsed: Duration,
}

/// A converted page plus what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedPage {
    pub record: EncodedRecord,
    pub original: (u32, u32),
    pub resized_to: Option<(u32, u32)>,
}

/// Convert one page: decode, apply the height cap, encode, rename.
///
/// The modification time is carried over unchanged.
pub fn convert_page(
    codec: &(impl ImageCodec + ?Sized),
    config: &ConvertConfig,
    entry: SourceEntry,
) -> Result<ConvertedPage, EntryError> {
    let SourceEntry {
        name,
        modified,
        payload,
    } = entry;

    let image = match codec.decode(&payload) {
        Ok(image) => image,
        Err(source) => return Err(EntryError::Decode { name, source }),
    };
    drop(payload);

    let decision = decide_resize(image.height, config.max_height);
    let params = EncodeParams {
        quality: config.quality,
        target_height: decision.target_height(),
    };
    let encoded = match codec.encode(&image, params) {
        Ok(bytes) => bytes,
        Err(source) => return Err(EntryError::Encode { name, source }),
    };

    let resized_to = match decision {
        ResizeDecision::Unchanged => None,
        ResizeDecision::Resize { target_height } => Some((
            scaled_width(image.width, image.height, target_height),
            target_height,
        )),
    };

    Ok(ConvertedPage {
        record: EncodedRecord {
            name: replace_suffix(&name, codec.output_extension()),
            modified,
            payload: encoded,
        },
        original: (image.width, image.height),
        resized_to,
    })
}

/// Convert one page into a record ready for the output archive.
pub fn convert_entry(
    codec: &(impl ImageCodec + ?Sized),
    config: &ConvertConfig,
    entry: SourceEntry,
) -> Result<EncodedRecord, EntryError> {
    convert_page(codec, config, entry).map(|page| page.record)
}

#[derive(Default)]
struct Tally {
    converted: usize,
    resized: usize,
    failed_names: Vec<String>,
}

/// Drives the conversion of whole archives with a shared codec and config.
pub struct ArchiveConverter<'a, C: ImageCodec + ?Sized> {
    codec: &'a C,
    config: &'a ConvertConfig,
    events: Option<&'a Sender<ConvertEvent>>,
}

impl<'a, C: ImageCodec + ?Sized> ArchiveConverter<'a, C> {
    pub fn new(codec: &'a C, config: &'a ConvertConfig) -> Self {
        Self {
            codec,
            config,
            events: None,
        }
    }

    /// Report progress on `events`.
    pub fn with_events(mut self, events: &'a Sender<ConvertEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: ConvertEvent) {
        if let Some(tx) = self.events {
            // Receiver gone means nobody is listening; conversion goes on.
            let _ = tx.send(event);
        }
    }

    /// Convert `source_path` into a new tar archive at `dest_path`.
    ///
    /// `dest_path` must not exist. On success the output holds one entry per
    /// page that converted, in completion order.
    pub fn convert(
        &self,
        source_path: &Path,
        dest_path: &Path,
    ) -> Result<ConvertSummary, ConvertError> {
        let start = Instant::now();

        let mut source = open_archive(source_path).map_err(|source| ConvertError::Open {
            path: source_path.to_path_buf(),
            source,
        })?;
        let writer = ArchiveWriter::create(dest_path).map_err(|source| ConvertError::Create {
            path: dest_path.to_path_buf(),
            source,
        })?;

        info!(
            "converting {} -> {}",
            source_path.display(),
            dest_path.display()
        );
        self.emit(ConvertEvent::ArchiveStarted {
            source: source_path.to_path_buf(),
            dest: dest_path.to_path_buf(),
        });

        let tally = Mutex::new(Tally::default());
        let mut skipped = 0;
        let read_result = self.dispatch(source.as_mut(), &writer, &tally, &mut skipped);
        drop(source);

        if let Err(source) = read_result {
            warn!("aborting {}: {source}", source_path.display());
            // No trailer: a truncated output must not pass for a whole archive.
            if let Err(e) = writer.abandon() {
                warn!("could not flush {}: {e}", dest_path.display());
            }
            return Err(ConvertError::Read {
                path: source_path.to_path_buf(),
                source,
            });
        }

        writer.finalize().map_err(|source| ConvertError::Finalize {
            path: dest_path.to_path_buf(),
            source,
        })?;

        let tally = tally.into_inner().unwrap_or_else(PoisonError::into_inner);
        let summary = ConvertSummary {
            converted: tally.converted,
            resized: tally.resized,
            skipped,
            failed: tally.failed_names.len(),
            failed_names: tally.failed_names,
            elapsed: start.elapsed(),
        };
        info!(
            "finished {}: {} converted ({} resized), {} skipped, {} failed in {:.2?}",
            dest_path.display(),
            summary.converted,
            summary.resized,
            summary.skipped,
            summary.failed,
            summary.elapsed
        );
        self.emit(ConvertEvent::ArchiveFinished {
            source: source_path.to_path_buf(),
            dest: dest_path.to_path_buf(),
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Read every entry and hand images to the pool.
    ///
    /// Returns only once all spawned workers have finished, whether the read
    /// loop ended at the end of the archive or on an error.
    fn dispatch<W: Write + Send>(
        &self,
        source: &mut dyn ArchiveSource,
        writer: &ArchiveWriter<W>,
        tally: &Mutex<Tally>,
        skipped: &mut usize,
    ) -> Result<(), ArchiveError> {
        rayon::scope(|s| {
            while let Some(entry) = source.next_entry()? {
                if !is_image(&entry.name) {
                    warn!("skipping non-image entry {}", entry.name);
                    *skipped += 1;
                    self.emit(ConvertEvent::EntrySkipped { name: entry.name });
                    continue;
                }
                s.spawn(move |_| self.convert_and_append(entry, writer, tally));
            }
            Ok(())
        })
    }

    fn convert_and_append<W: Write>(
        &self,
        entry: SourceEntry,
        writer: &ArchiveWriter<W>,
        tally: &Mutex<Tally>,
    ) {
        let name = entry.name.clone();
        let outcome = convert_page(self.codec, self.config, entry).and_then(|page| {
            let output_name = page.record.name.clone();
            writer
                .append(page.record)
                .map_err(|source| EntryError::Append {
                    name: name.clone(),
                    source,
                })?;
            Ok((output_name, page.original, page.resized_to))
        });

        match outcome {
            Ok((output_name, original, resized_to)) => {
                debug!(
                    "converted {name} -> {output_name} ({}x{}{})",
                    original.0,
                    original.1,
                    resized_to
                        .map(|(w, h)| format!(" resized to {w}x{h}"))
                        .unwrap_or_default()
                );
                {
                    let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
                    tally.converted += 1;
                    if resized_to.is_some() {
                        tally.resized += 1;
                    }
                }
                self.emit(ConvertEvent::EntryConverted {
                    name,
                    output_name,
                    original,
                    resized_to,
                });
            }
            Err(e) => {
                warn!("failed to convert {e}");
                tally
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .failed_names
                    .push(name.clone());
                self.emit(ConvertEvent::EntryFailed {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }
}
