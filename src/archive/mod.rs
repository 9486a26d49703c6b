//! Archive containers: sequential readers for source archives and the
//! synchronized tar writer for the output.

pub mod source;
pub mod writer;

pub use source::{ArchiveError, ArchiveSource, SourceEntry, open_archive};
pub use writer::{ArchiveWriter, EncodedRecord, WriterError};
