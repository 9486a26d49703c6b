//! Synchronized tar writer for the output archive.
//!
//! Conversion workers finish in unpredictable order and all append to the same
//! byte stream. A tar entry is a header block followed by padded payload
//! blocks. If two workers interleaved those writes, the container would be
//! corrupted, so [`ArchiveWriter::append`] holds a mutex across the whole
//! header+payload pair. Entry order in the output is completion order.
//!
//! Lifecycle:
//!
//! ```text
//! create (exclusive) ──► append × N (any thread) ──► finalize | abandon (once)
//! ```
//!
//! Only [`ArchiveWriter::finalize`] writes the end-of-archive trailer. An
//! abandoned writer, or one dropped without finalizing, keeps the entries
//! already written and ends without a trailer, so a failed conversion never
//! looks like a complete archive. After either call, every further call
//! fails with [`WriterError::Finalized`].

use log::warn;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("destination already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive already finalized or abandoned")]
    Finalized,
    #[error("archive writer lock poisoned")]
    Poisoned,
}

/// A converted page, ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub name: String,
    pub modified: SystemTime,
    pub payload: Vec<u8>,
}

/// Permission bits stored for every entry.
const ENTRY_MODE: u32 = 0o644;

/// Pass-through writer that can be switched off.
///
/// `tar::Builder` writes the trailer when it is dropped or unwrapped. Sealing
/// the sink first turns those writes into no-ops.
struct Sealable<W: Write> {
    inner: W,
    sealed: bool,
}

impl<W: Write> Write for Sealable<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.sealed {
            Ok(buf.len())
        } else {
            self.inner.write(buf)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.sealed {
            Ok(())
        } else {
            self.inner.flush()
        }
    }
}

struct WriterState<W: Write> {
    /// `None` once finalized or abandoned.
    builder: Option<tar::Builder<Sealable<W>>>,
    names: HashSet<String>,
    entries: usize,
}

/// Output archive shared by all conversion workers.
pub struct ArchiveWriter<W: Write> {
    state: Mutex<WriterState<W>>,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create the destination file, failing if anything already exists there.
    pub fn create(path: &Path) -> Result<Self, WriterError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => WriterError::AlreadyExists(path.to_path_buf()),
                _ => WriterError::Io(e),
            })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(WriterState {
                builder: Some(tar::Builder::new(Sealable {
                    inner: writer,
                    sealed: false,
                })),
                names: HashSet::new(),
                entries: 0,
            }),
        }
    }

    /// Append one record as a regular-file entry.
    ///
    /// Safe to call from many threads; header and payload are written under
    /// the same lock. Duplicate names are written as-is and logged.
    pub fn append(&self, record: EncodedRecord) -> Result<(), WriterError> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(record.payload.len() as u64);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(unix_seconds(record.modified));

        let mut guard = self.state.lock().map_err(|_| WriterError::Poisoned)?;
        let state = &mut *guard;
        let builder = state.builder.as_mut().ok_or(WriterError::Finalized)?;
        builder.append_data(&mut header, &record.name, record.payload.as_slice())?;
        state.entries += 1;
        if state.names.contains(&record.name) {
            warn!("duplicate entry name in output: {}", record.name);
        } else {
            state.names.insert(record.name);
        }
        Ok(())
    }

    /// Write the end-of-archive marker, flush, and hand back the writer.
    pub fn finalize(&self) -> Result<W, WriterError> {
        let mut state = self.state.lock().map_err(|_| WriterError::Poisoned)?;
        let builder = state.builder.take().ok_or(WriterError::Finalized)?;
        let mut inner = builder.into_inner()?.inner;
        inner.flush()?;
        Ok(inner)
    }

    /// Stop writing without a trailer, flush, and hand back the writer.
    ///
    /// The output keeps every entry appended so far but is not a complete
    /// tar archive.
    pub fn abandon(&self) -> Result<W, WriterError> {
        let mut state = self.state.lock().map_err(|_| WriterError::Poisoned)?;
        let mut builder = state.builder.take().ok_or(WriterError::Finalized)?;
        builder.get_mut().flush()?;
        builder.get_mut().sealed = true;
        Ok(builder.into_inner()?.inner)
    }

    /// Number of records appended so far.
    pub fn entry_count(&self) -> usize {
        self.state.lock().map(|s| s.entries).unwrap_or(0)
    }
}

impl<W: Write> Drop for ArchiveWriter<W> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(builder) = state.builder.as_mut() {
            builder.get_mut().sealed = true;
        }
    }
}
