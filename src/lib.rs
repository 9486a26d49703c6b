//! # Comic Shrink
//!
//! Shrinks comic book archives for reading on small screens. Every page of a
//! `.cbz`/`.cbt` (or plain `.zip`/`.tar`) is decoded, scaled down if it is
//! taller than a height cap, re-encoded as lossy WebP, and written into a new
//! `.cbt` archive next to the original. Non-image entries are dropped.
//!
//! # Architecture: Read → Convert → Append
//!
//! ```text
//! source archive ──► ArchiveSource ──► (rayon pool) convert_entry ──► ArchiveWriter ──► <name>[resized].cbt
//!   sequential          one entry         decode / resize / encode       mutex-guarded tar
//! ```
//!
//! Reading is strictly sequential; conversion fans out over the rayon pool;
//! appends are serialized by the writer. A `rayon::scope` around the whole read
//! loop is the completion barrier that keeps the tar trailer from being written
//! while a page is still in flight.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Suffix rules: which entries are images, which files are comics, output names |
//! | [`imaging`] | Resize policy and the codec trait with its pure-Rust WebP implementation |
//! | [`archive`] | Zip/tar/rar source readers and the synchronized tar writer |
//! | [`convert`] | Per-page worker and the per-archive pipeline |
//! | [`batch`] | Single-file or directory-tree runs with mirrored output directories |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting for progress events and summaries |
//!
//! # Design Decisions
//!
//! ## Failure Isolation
//!
//! A page that fails to decode or encode is left out of the output and
//! reported; the archive still converts. Only problems with the containers
//! themselves (unreadable source, existing destination, truncated structure,
//! failed finalize) fail an archive, and in a directory run even those only
//! fail that one archive.
//!
//! An archive that fails after its output was created keeps the pages that
//! finished, but the output gets no end-of-archive trailer. Only a completed
//! conversion writes one.
//!
//! ## Never Overwrite
//!
//! The destination is opened with exclusive create. A rerun over a library
//! that was already converted fails fast on each archive instead of clobbering
//! earlier output.
//!
//! ## Pure-Rust Decoding
//!
//! Decoding goes through the `image` crate (Lanczos3 resampling), so the binary
//! needs no ImageMagick or other system tools. WebP encoding uses libwebp
//! through the `webp` crate because `image` only writes lossless WebP.

pub mod archive;
pub mod batch;
pub mod config;
pub mod convert;
pub mod imaging;
pub mod naming;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
