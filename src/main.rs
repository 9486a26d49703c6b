use clap::Parser;
use comic_shrink::batch::{self, BatchSummary};
use comic_shrink::convert::ConvertConfig;
use comic_shrink::{config, output};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "comic-shrink")]
#[command(about = "Shrink comic archives: downscale tall pages and re-encode them as WebP")]
#[command(long_about = "\
Shrink comic archives: downscale tall pages and re-encode them as WebP

Each page of a .cbz/.cbt (or .zip/.tar) archive is decoded, scaled down to
MAX_HEIGHT if it is taller, encoded as lossy WebP at QUALITY, and written to
a new tar archive named '<name>[resized].cbt'. Other entries are dropped.

  library/                      DEST/
  ├── Saga/                     ├── Saga/
  │   ├── Vol 1.cbz      ──►    │   ├── Vol 1[resized].cbt
  │   └── Vol 2.cbz      ──►    │   └── Vol 2[resized].cbt
  └── notes.txt                 (ignored)

Existing outputs are never overwritten. Set RUST_LOG=debug for per-page logs.

Run 'comic-shrink --gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Comic archive, or directory searched recursively for archives
    #[arg(required_unless_present = "gen_config")]
    source: Option<PathBuf>,

    /// Output directory [default: the source's parent directory]
    dest: Option<PathBuf>,

    /// WebP quality, 0-100 [default: 85]
    #[arg(value_parser = clap::value_parser!(u32).range(0..=100))]
    quality: Option<u32>,

    /// Pages taller than this are downscaled to it [default: 1440]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    max_height: Option<u32>,

    /// Read settings from this config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum pages converted in parallel [default: CPU cores]
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Print a stock config.toml with all options documented
    #[arg(long)]
    gen_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }
    let Some(source) = cli.source else {
        return Err("missing SOURCE".into());
    };

    let config = config::load_config(cli.config.as_deref())?.with_overrides(
        cli.quality,
        cli.max_height,
        cli.jobs,
    )?;
    init_thread_pool(&config.processing);
    log::info!(
        "quality: {} | max height: {}",
        config.images.quality,
        config.images.max_height
    );

    let dest = cli
        .dest
        .unwrap_or_else(|| batch::default_dest_dir(&source));
    let convert_config = ConvertConfig::from_config(&config);

    let start = Instant::now();
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_convert_event(&event);
        }
    });
    let result = batch::convert_path(&source, &dest, &convert_config, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            output::print_aborted(start.elapsed());
            return Err(e.into());
        }
    };
    output::print_batch_summary(&summary);
    check_failures(&summary)
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// A run with failed archives exits non-zero after everything else finished.
fn check_failures(summary: &BatchSummary) -> Result<(), Box<dyn std::error::Error>> {
    if summary.failed_archives.is_empty() {
        Ok(())
    } else {
        Err(format!("{} archive(s) failed to convert", summary.failed_archives.len()).into())
    }
}
