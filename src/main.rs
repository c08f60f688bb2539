use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use pageturn::config;
use pageturn::page::{Page, PageId};
use pageturn::prefetch::PrefetchCache;
use pageturn::provider::local::DEFAULT_EXTENSION;
use pageturn::series::{self, Series};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PAGETURN_BUILD_GIT_HASH"),
    " ",
    env!("PAGETURN_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "pageturn",
    version,
    long_version = LONG_VERSION,
    about = "Page-by-page comic reader with bidirectional prefetch"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Series to open in the viewer (name in the series dir, or a path)
    series: Option<String>,

    /// Pages to keep loaded ahead of the current one
    #[arg(long, global = true)]
    lookahead: Option<usize>,

    /// Pages to keep loaded behind the current one
    #[arg(long, global = true)]
    lookbehind: Option<usize>,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List series in the series directory
    List,

    /// Fetch pages through the prefetch cache and write them to files
    Dump {
        /// Series name or path
        series: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Number of pages to write, starting at the bookmark
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Create a series for a folder of numbered images (0.png, 1.png, ...)
    AddLocal {
        /// Series name
        name: String,

        /// Folder holding the images
        folder: PathBuf,

        /// Image file extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        ext: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // viewer mode + no --log → logger not initialized (no log output)

    // Load config file and merge CLI overrides
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.lookahead, cli.lookbehind);
    let config = cfg.resolve();

    let result = match cli.command {
        Some(Command::List) => cmd_list(&config),
        Some(Command::Dump {
            series,
            output,
            count,
        }) => cmd_dump(&series, &config, &output, count),
        Some(Command::AddLocal { name, folder, ext }) => {
            cmd_add_local(&name, &folder, &ext, &config)
        }
        None => match cli.series {
            Some(name) => Series::open(&config.series_dir, &name)
                .and_then(|series| pageturn::viewer::run(series, &config)),
            None => Err(anyhow::anyhow!("series name required (see `pageturn list`)")),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_list(config: &config::Config) -> Result<()> {
    let names = series::list(&config.series_dir)?;
    if names.is_empty() {
        eprintln!("no series in {}", config.series_dir.display());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_add_local(name: &str, folder: &Path, ext: &str, config: &config::Config) -> Result<()> {
    let path = series::write_local(&config.series_dir, name, folder, ext)?;
    eprintln!("created {}", path.display());
    Ok(())
}

fn cmd_dump(name: &str, config: &config::Config, output: &Path, count: usize) -> Result<()> {
    let start = Instant::now();
    let series = Series::open(&config.series_dir, name)?;
    let provider = series.provider(&config.http)?;
    let seed = series.load_seed(provider.as_ref())?;
    fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let cache = PrefetchCache::new(provider, seed, config.prefetch.clone());
    let mut page = cache.current();
    let mut files = Vec::new();
    for index in 0..count {
        if index > 0 {
            let next = cache.next();
            if next.id() == page.id() {
                if page.has_next() {
                    warn!("dump: timed out waiting for the page after {}", page.id());
                }
                break;
            }
            page = next;
        }
        let filename = dump_filename(index, &page);
        let path = output.join(&filename);
        fs::write(&path, page.content())
            .with_context(|| format!("failed to write {}", path.display()))?;
        files.push((filename, page.content().len()));
    }
    cache.stop();

    info!(
        "cmd_dump: {} page(s) in {:.1}ms",
        files.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    eprintln!("dumped {} -> {} page(s):", series.name, files.len());
    for (filename, size) in &files {
        eprintln!("  {} ({} bytes)", filename, size);
    }
    Ok(())
}

/// `<index>-<id>.<ext>`, with the id reduced to filename-safe characters.
fn dump_filename(index: usize, page: &Page) -> String {
    let id = match page.id() {
        PageId::Number(n) => n.to_string(),
        PageId::Url(url) => url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
    };
    let ext = image::guess_format(page.content())
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin");
    format!("{index:03}-{id}.{ext}")
}
