//! CLI output formatting for conversion progress.
//!
//! # Output Format
//!
//! ```text
//! library/Saga/Vol 1.cbz → out/Saga/Vol 1[resized].cbt
//!     001.png: resized to 960x1440
//!     002.jpg: converted
//!     ComicInfo.xml: skipped
//!     003.png: FAILED: 003.png: decode failed: ...
//!     Converted 2 pages (1 resized), 1 skipped, 1 failed in 1.84s
//! library/Saga/Vol 2.cbr: FAILED after 0.02s: cannot open ...
//!
//! Converted 1 archive (1 failed), 2 pages (1 failed) in 2.10s
//! ```
//!
//! A run that stops on a fatal error ends with `Aborted after 0.31s` instead
//! of the totals.
//!
//! Entry lines appear in completion order, which is not the order of the
//! source archive.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::batch::BatchSummary;
use crate::convert::{ConvertEvent, ConvertSummary};
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `2 pages`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Seconds with two decimals: `1.84s`.
fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

/// One-line summary of a finished archive.
pub fn format_convert_summary(summary: &ConvertSummary) -> String {
    format!(
        "Converted {} ({} resized), {} skipped, {} failed in {}",
        count(summary.converted, "page", "pages"),
        summary.resized,
        summary.skipped,
        summary.failed,
        format_elapsed(summary.elapsed)
    )
}

// ============================================================================
// Progress events
// ============================================================================

/// Format a single conversion progress event as display lines.
pub fn format_convert_event(event: &ConvertEvent) -> Vec<String> {
    match event {
        ConvertEvent::ArchiveStarted { source, dest } => {
            vec![format!("{} \u{2192} {}", source.display(), dest.display())]
        }
        ConvertEvent::EntryConverted {
            name, resized_to, ..
        } => {
            let status = match resized_to {
                Some((w, h)) => format!("resized to {w}x{h}"),
                None => "converted".to_string(),
            };
            vec![format!("{}{}: {}", indent(1), name, status)]
        }
        ConvertEvent::EntrySkipped { name } => {
            vec![format!("{}{}: skipped", indent(1), name)]
        }
        ConvertEvent::EntryFailed { name, reason } => {
            vec![format!("{}{}: FAILED: {}", indent(1), name, reason)]
        }
        ConvertEvent::ArchiveFinished { summary, .. } => {
            vec![format!("{}{}", indent(1), format_convert_summary(summary))]
        }
        ConvertEvent::ArchiveFailed {
            source,
            reason,
            elapsed,
        } => {
            vec![format!(
                "{}: FAILED after {}: {}",
                source.display(),
                format_elapsed(*elapsed),
                reason
            )]
        }
    }
}

/// Print a progress event to stdout.
pub fn print_convert_event(event: &ConvertEvent) {
    for line in format_convert_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Format the totals of a whole run, preceded by a blank separator line.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut archives = count(summary.archives, "archive", "archives");
    if !summary.failed_archives.is_empty() {
        archives.push_str(&format!(" ({} failed)", summary.failed_archives.len()));
    }
    let mut pages = count(summary.entries_converted, "page", "pages");
    if summary.entries_failed > 0 {
        pages.push_str(&format!(" ({} failed)", summary.entries_failed));
    }

    let mut lines = vec![
        String::new(),
        format!(
            "Converted {}, {} in {}",
            archives,
            pages,
            format_elapsed(summary.elapsed)
        ),
    ];
    for path in &summary.failed_archives {
        lines.push(format!("{}Failed: {}", indent(1), path.display()));
    }
    lines
}

/// Print the run totals to stdout.
pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

/// Closing lines of a run that stopped on a fatal error.
pub fn format_aborted(elapsed: Duration) -> Vec<String> {
    vec![String::new(), format!("Aborted after {}", format_elapsed(elapsed))]
}

pub fn print_aborted(elapsed: Duration) {
    for line in format_aborted(elapsed) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn summary(converted: usize, resized: usize, skipped: usize, failed: usize) -> ConvertSummary {
        ConvertSummary {
            converted,
            resized,
            skipped,
            failed,
            failed_names: Vec::new(),
            elapsed: Duration::from_millis(1840),
        }
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn count_pluralizes() {
        assert_eq!(count(1, "page", "pages"), "1 page");
        assert_eq!(count(0, "page", "pages"), "0 pages");
        assert_eq!(count(7, "page", "pages"), "7 pages");
    }

    #[test]
    fn elapsed_two_decimals() {
        assert_eq!(format_elapsed(Duration::from_millis(1840)), "1.84s");
        assert_eq!(format_elapsed(Duration::ZERO), "0.00s");
    }

    #[test]
    fn archive_started_line() {
        let lines = format_convert_event(&ConvertEvent::ArchiveStarted {
            source: PathBuf::from("in/Vol 1.cbz"),
            dest: PathBuf::from("out/Vol 1[resized].cbt"),
        });
        assert_eq!(lines, ["in/Vol 1.cbz \u{2192} out/Vol 1[resized].cbt"]);
    }

    #[test]
    fn converted_entry_lines() {
        let resized = format_convert_event(&ConvertEvent::EntryConverted {
            name: "001.png".into(),
            output_name: "001.webp".into(),
            original: (2000, 3000),
            resized_to: Some((960, 1440)),
        });
        assert_eq!(resized, ["    001.png: resized to 960x1440"]);

        let kept = format_convert_event(&ConvertEvent::EntryConverted {
            name: "002.jpg".into(),
            output_name: "002.webp".into(),
            original: (800, 1200),
            resized_to: None,
        });
        assert_eq!(kept, ["    002.jpg: converted"]);
    }

    #[test]
    fn skipped_and_failed_entry_lines() {
        let skipped = format_convert_event(&ConvertEvent::EntrySkipped {
            name: "ComicInfo.xml".into(),
        });
        assert_eq!(skipped, ["    ComicInfo.xml: skipped"]);

        let failed = format_convert_event(&ConvertEvent::EntryFailed {
            name: "bad.png".into(),
            reason: "decode failed".into(),
        });
        assert_eq!(failed, ["    bad.png: FAILED: decode failed"]);
    }

    #[test]
    fn archive_finished_line() {
        let lines = format_convert_event(&ConvertEvent::ArchiveFinished {
            source: PathBuf::from("a.cbz"),
            dest: PathBuf::from("a[resized].cbt"),
            summary: summary(2, 1, 1, 1),
        });
        assert_eq!(
            lines,
            ["    Converted 2 pages (1 resized), 1 skipped, 1 failed in 1.84s"]
        );
    }

    #[test]
    fn archive_failed_line() {
        let lines = format_convert_event(&ConvertEvent::ArchiveFailed {
            source: PathBuf::from("b.cbr"),
            reason: "unsupported".into(),
            elapsed: Duration::from_millis(20),
        });
        assert_eq!(lines, ["b.cbr: FAILED after 0.02s: unsupported"]);
    }

    #[test]
    fn aborted_run_reports_elapsed() {
        assert_eq!(
            format_aborted(Duration::from_millis(310)),
            ["", "Aborted after 0.31s"]
        );
    }

    #[test]
    fn convert_summary_single_page() {
        assert_eq!(
            format_convert_summary(&summary(1, 0, 0, 0)),
            "Converted 1 page (0 resized), 0 skipped, 0 failed in 1.84s"
        );
    }

    #[test]
    fn batch_summary_clean_run() {
        let lines = format_batch_summary(&BatchSummary {
            archives: 3,
            failed_archives: Vec::new(),
            entries_converted: 120,
            entries_failed: 0,
            elapsed: Duration::from_secs(12),
        });
        assert_eq!(lines, ["", "Converted 3 archives, 120 pages in 12.00s"]);
    }

    #[test]
    fn batch_summary_lists_failures() {
        let lines = format_batch_summary(&BatchSummary {
            archives: 1,
            failed_archives: vec![PathBuf::from("lib/b.cbr")],
            entries_converted: 2,
            entries_failed: 1,
            elapsed: Duration::from_millis(2100),
        });
        assert_eq!(
            lines,
            [
                "",
                "Converted 1 archive (1 failed), 2 pages (1 failed) in 2.10s",
                "    Failed: lib/b.cbr",
            ]
        );
    }
}
