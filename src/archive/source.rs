//! Sequential readers over source comic archives.
//!
//! Every reader exposes the same single-pass cursor, [`ArchiveSource::next_entry`],
//! which yields one [`SourceEntry`] per regular file and `Ok(None)` at the end.
//! Directory entries are skipped by the cursor itself.
//!
//! | Format | Detection | Reader |
//! |---|---|---|
//! | zip (`.cbz`, `.zip`) | `PK\x03\x04` | [`ZipSource`] (`zip` crate) |
//! | tar (`.cbt`, `.tar`) | `ustar` at offset 257 | [`TarSource`] (`tar` crate) |
//! | rar (`.cbr`, `.rar`) | `Rar!\x1a\x07` | [`RarSource`] (`unrar` crate) |
//!
//! Magic bytes win over the suffix, so a `.cbr` that is really a zip (common
//! in the wild) is read as a zip.
//!
//! Payloads are read whole. The size an archive declares for an entry only
//! sizes the initial buffer up to [`MAX_PREALLOC`]; a tar entry whose data
//! ends before its declared size is an error.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("rar error: {0}")]
    Rar(String),
    #[error("unsupported archive format ({format}): {path}")]
    Unsupported { path: PathBuf, format: &'static str },
    #[error("archive reader thread panicked")]
    ReaderPanicked,
}

/// One file read out of a source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub modified: SystemTime,
    pub payload: Vec<u8>,
}

/// Single-pass cursor over the entries of an archive.
///
/// The underlying file is closed when the source is dropped.
pub trait ArchiveSource: Send {
    /// Read the next file entry, or `Ok(None)` once the archive is exhausted.
    fn next_entry(&mut self) -> Result<Option<SourceEntry>, ArchiveError>;
}

/// Container formats recognized by [`detect_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    Rar,
    Unknown,
}

/// Bytes needed to see the tar magic at offset 257.
const SNIFF_LEN: usize = 262;

/// Upper bound on the buffer reserved up front for one entry payload.
pub const MAX_PREALLOC: u64 = 64 << 20;

fn payload_buffer(declared: u64) -> Vec<u8> {
    Vec::with_capacity(declared.min(MAX_PREALLOC) as usize)
}

/// Identify the container from its leading bytes, falling back to the suffix.
pub fn detect_format(header: &[u8], path: &Path) -> ArchiveFormat {
    if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
        return ArchiveFormat::Zip;
    }
    if header.starts_with(b"Rar!\x1a\x07") {
        return ArchiveFormat::Rar;
    }
    if header.len() >= SNIFF_LEN && &header[257..262] == b"ustar" {
        return ArchiveFormat::Tar;
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "cbz" | "zip" => ArchiveFormat::Zip,
        "cbt" | "tar" => ArchiveFormat::Tar,
        "cbr" | "rar" => ArchiveFormat::Rar,
        _ => ArchiveFormat::Unknown,
    }
}

/// Open a source archive and return a cursor over its entries.
pub fn open_archive(path: &Path) -> Result<Box<dyn ArchiveSource>, ArchiveError> {
    let mut file = File::open(path)?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut header)?;
    file.seek(SeekFrom::Start(0))?;

    match detect_format(&header, path) {
        ArchiveFormat::Zip => Ok(Box::new(ZipSource::new(BufReader::new(file))?)),
        ArchiveFormat::Tar => Ok(Box::new(TarSource::new(BufReader::new(file)))),
        ArchiveFormat::Rar => {
            drop(file);
            Ok(Box::new(RarSource::open(path)?))
        }
        ArchiveFormat::Unknown => Err(ArchiveError::Unsupported {
            path: path.to_path_buf(),
            format: "unknown",
        }),
    }
}

// ============================================================================
// Zip
// ============================================================================

/// Zip reader walking the central directory by index.
pub struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    next_index: usize,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            archive: zip::ZipArchive::new(reader)?,
            next_index: 0,
        })
    }
}

/// Zip stores local time without a zone; it is read as UTC.
/// Unrepresentable stamps fall back to the epoch.
fn zip_time(dt: zip::DateTime) -> SystemTime {
    dt.to_time().map(SystemTime::from).unwrap_or(UNIX_EPOCH)
}

impl<R: Read + Seek + Send> ArchiveSource for ZipSource<R> {
    fn next_entry(&mut self) -> Result<Option<SourceEntry>, ArchiveError> {
        while self.next_index < self.archive.len() {
            let mut file = self.archive.by_index(self.next_index)?;
            self.next_index += 1;
            if file.is_dir() {
                continue;
            }
            let mut payload = payload_buffer(file.size());
            file.read_to_end(&mut payload)?;
            return Ok(Some(SourceEntry {
                name: file.name().to_string(),
                modified: zip_time(file.last_modified()),
                payload,
            }));
        }
        Ok(None)
    }
}

// ============================================================================
// Reader thread
// ============================================================================

type EntrySender = SyncSender<Result<SourceEntry, ArchiveError>>;

/// A walk running on its own thread, handing entries over a rendezvous
/// channel. The walk never gets ahead of the consumer by more than one entry.
///
/// Used for readers whose entry iterator borrows the archive (tar) or whose
/// handle cannot leave the thread that opened it (rar).
struct ReaderThread {
    rx: Receiver<Result<SourceEntry, ArchiveError>>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderThread {
    /// Run `walk` on a new thread. An error it returns is delivered as the
    /// last item. The walk should return `Ok(())` as soon as a send fails:
    /// the consumer is gone.
    fn spawn<F>(walk: F) -> Self
    where
        F: FnOnce(&EntrySender) -> Result<(), ArchiveError> + Send + 'static,
    {
        let (tx, rx) = sync_channel(0);
        let handle = std::thread::spawn(move || {
            if let Err(e) = walk(&tx) {
                let _ = tx.send(Err(e));
            }
        });
        Self {
            rx,
            handle: Some(handle),
        }
    }

    fn next_entry(&mut self) -> Result<Option<SourceEntry>, ArchiveError> {
        match self.rx.recv() {
            Ok(result) => result.map(Some),
            // Sender dropped: the walk finished, or the reader died.
            Err(_) => match self.handle.take().map(JoinHandle::join) {
                Some(Err(_)) => Err(ArchiveError::ReaderPanicked),
                _ => Ok(None),
            },
        }
    }
}

// ============================================================================
// Tar
// ============================================================================

/// Tar reader.
///
/// `tar::Archive::entries` borrows the archive for the lifetime of the
/// iterator, so the walk runs on a [`ReaderThread`].
pub struct TarSource {
    reader: ReaderThread,
}

impl TarSource {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: ReaderThread::spawn(move |tx| read_tar(reader, tx)),
        }
    }
}

fn read_tar<R: Read>(reader: R, tx: &EntrySender) -> Result<(), ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        if let Some(entry) = read_tar_entry(entry?)? {
            // Receiver gone: the consumer stopped early.
            if tx.send(Ok(entry)).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn read_tar_entry<R: Read>(mut entry: tar::Entry<'_, R>) -> std::io::Result<Option<SourceEntry>> {
    if !entry.header().entry_type().is_file() {
        return Ok(None);
    }
    let name = entry.path()?.to_string_lossy().into_owned();
    let modified = UNIX_EPOCH + Duration::from_secs(entry.header().mtime()?);
    let declared = entry.size();
    let mut payload = payload_buffer(declared);
    entry.read_to_end(&mut payload)?;
    if payload.len() as u64 != declared {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "{name}: archive ends after {} of {declared} bytes",
                payload.len()
            ),
        ));
    }
    Ok(Some(SourceEntry {
        name,
        modified,
        payload,
    }))
}

impl ArchiveSource for TarSource {
    fn next_entry(&mut self) -> Result<Option<SourceEntry>, ArchiveError> {
        self.reader.next_entry()
    }
}

// ============================================================================
// Rar
// ============================================================================

/// Rar reader backed by the `unrar` library.
///
/// The native archive handle stays on the [`ReaderThread`] that opened it.
/// Opening is still reported synchronously: [`RarSource::open`] waits until
/// the thread has either opened the archive or failed to.
pub struct RarSource {
    reader: ReaderThread,
}

impl RarSource {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let path = path.to_path_buf();
        let (opened_tx, opened_rx) = sync_channel(1);
        let reader = ReaderThread::spawn(move |tx| {
            match unrar::Archive::new(&path).open_for_processing() {
                Ok(archive) => {
                    let _ = opened_tx.send(Ok(()));
                    read_rar(archive, tx)
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(rar_error(e)));
                    Ok(())
                }
            }
        });
        match opened_rx.recv() {
            Ok(Ok(())) => Ok(Self { reader }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ArchiveError::ReaderPanicked),
        }
    }
}

fn rar_error(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Rar(e.to_string())
}

/// Rar stamps are MS-DOS date/time pairs, date in the high half.
fn rar_time(stamp: u32) -> SystemTime {
    zip_time(zip::DateTime::from_msdos((stamp >> 16) as u16, stamp as u16))
}

fn read_rar(
    mut archive: unrar::OpenArchive<unrar::Process, unrar::CursorBeforeHeader>,
    tx: &EntrySender,
) -> Result<(), ArchiveError> {
    while let Some(header) = archive.read_header().map_err(rar_error)? {
        let entry = header.entry();
        if !entry.is_file() {
            archive = header.skip().map_err(rar_error)?;
            continue;
        }
        let name = entry.filename.to_string_lossy().into_owned();
        let modified = rar_time(entry.file_time);
        let (payload, rest) = header.read().map_err(rar_error)?;
        archive = rest;
        let entry = SourceEntry {
            name,
            modified,
            payload,
        };
        if tx.send(Ok(entry)).is_err() {
            return Ok(());
        }
    }
    Ok(())
}

impl ArchiveSource for RarSource {
    fn next_entry(&mut self) -> Result<Option<SourceEntry>, ArchiveError> {
        self.reader.next_entry()
    }
}
