//! Name-based classification and renaming.
//!
//! Every decision here is made from the final suffix of a name alone, with no
//! content sniffing and no filesystem access:
//!
//! - `page_01.PNG` → image (suffix `png`, case-insensitive)
//! - `Vol 1.CBZ` → comic archive
//! - `notes.cbz.txt` → neither (only the last suffix counts)
//! - `README` → neither (no suffix)
//!
//! Renaming follows the same rule: only the final suffix is replaced, so
//! `chapter1/page_01.PNG` becomes `chapter1/page_01.webp`.

/// Image suffixes accepted for conversion.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp", "bmp", "gif", "tga"];

/// Container suffixes recognized as comic archives.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["cbr", "cbz", "cbt", "rar", "zip", "tar"];

/// Marker appended to the stem of every converted archive.
pub const OUTPUT_MARKER: &str = "[resized]";

/// Suffix of the output container (uncompressed tar).
pub const OUTPUT_ARCHIVE_EXTENSION: &str = "cbt";

/// Return the final suffix of `name` (without the dot), if any.
///
/// Only the last path component is considered, and a leading dot
/// (`.hidden`) does not count as a suffix.
fn extension(name: &str) -> Option<&str> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&file_name[pos + 1..]),
    }
}

fn has_extension_in(name: &str, allowed: &[&str]) -> bool {
    extension(name).is_some_and(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// True if the entry name carries one of the [`IMAGE_EXTENSIONS`].
pub fn is_image(name: &str) -> bool {
    !name.ends_with('/') && has_extension_in(name, IMAGE_EXTENSIONS)
}

/// True if the file name carries one of the [`ARCHIVE_EXTENSIONS`].
pub fn is_comic_archive(name: &str) -> bool {
    has_extension_in(name, ARCHIVE_EXTENSIONS)
}

/// Replace the final suffix of `name` with `new_ext` (given without the dot).
///
/// Names without a suffix get `new_ext` appended.
pub fn replace_suffix(name: &str, new_ext: &str) -> String {
    let stem = match extension(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    };
    format!("{stem}.{new_ext}")
}

/// Build the output archive file name for a source archive file name.
///
/// `Vol 1.cbz` → `Vol 1[resized].cbt`
pub fn output_archive_name(source_file_name: &str) -> String {
    let stem = match extension(source_file_name) {
        Some(ext) => &source_file_name[..source_file_name.len() - ext.len() - 1],
        None => source_file_name,
    };
    format!("{stem}{OUTPUT_MARKER}.{OUTPUT_ARCHIVE_EXTENSION}")
}
