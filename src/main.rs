//! # sitemap-gen CLI
//!
//! The `sitemap-gen` binary turns an XML offers feed into sitemap files.
//!
//! ## Usage
//!
//! ```bash
//! sitemap-gen [--config ./sitemap.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sitemap-gen generate` | Write sitemap files (and an index when needed) |
//! | `sitemap-gen check` | Parse the feed and count addresses without writing |
//!
//! ## Examples
//!
//! ```bash
//! # All offer URLs of a gzipped feed, gzip twins, absolute index locations
//! sitemap-gen generate --source feed.xml.gz --output-dir public/sitemaps \
//!     --gzip --base-url https://shop.example/sitemaps
//!
//! # Offer and category URLs, 10,000 per file, machine-readable report
//! sitemap-gen generate --source feed.xml --output-dir out \
//!     --selector '//offer/url' --selector '//category/@href' \
//!     --max-urls 10000 --json
//!
//! # Everything from a config file, just counting
//! sitemap-gen --config sitemap.toml check
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use sitemap_gen::config::{self, Config};
use sitemap_gen::generate;
use sitemap_gen::logging;
use sitemap_gen::progress::{NoProgress, ProgressMode};

/// sitemap-gen: XML offers feed to sitemaps.org sitemap files.
///
/// Parameters come from an optional TOML file given with `--config`; any
/// flag given on the command line overrides the file.
#[derive(Parser)]
#[command(
    name = "sitemap-gen",
    about = "Generate sitemap files and a sitemap index from an XML offers feed",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Generate sitemap files.
    ///
    /// Selector matches are written in order, at most `--max-urls` per file,
    /// as `{prefix}.xml`, `{prefix}1.xml`, ... in the output directory. A
    /// sitemap index is written when two or more files are produced.
    Generate {
        #[command(flatten)]
        params: Params,

        /// Compute everything but write nothing.
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Progress on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Parse the feed and count addresses per selector without writing.
    Check {
        #[command(flatten)]
        params: Params,

        /// Print the report as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
}

/// Overrides for configuration fields.
#[derive(Args)]
struct Params {
    /// Input feed (XML, optionally gzip-compressed).
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory receiving the sitemap files. Created if absent.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Selector expression. Repeat for several; applied in the given order.
    #[arg(long = "selector")]
    selectors: Vec<String>,

    /// Sub-root for relative selectors (first match).
    #[arg(long)]
    context: Option<String>,

    /// Maximum URLs per sitemap file (1..=50000).
    #[arg(long)]
    max_urls: Option<usize>,

    /// Priority written for every URL (0.0..=1.0).
    #[arg(long)]
    priority: Option<f64>,

    /// Output file name prefix.
    #[arg(long)]
    prefix: Option<String>,

    /// Also write a `.xml.gz` copy of every sitemap file.
    #[arg(long)]
    gzip: bool,

    /// Public URL of the output directory, used for index locations.
    #[arg(long)]
    base_url: Option<String>,
}

impl Params {
    fn apply(self, cfg: &mut Config) {
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(output_dir) = self.output_dir {
            cfg.output_dir = output_dir;
        }
        if !self.selectors.is_empty() {
            cfg.selectors = self.selectors;
        }
        if self.context.is_some() {
            cfg.context = self.context;
        }
        if let Some(max) = self.max_urls {
            cfg.max_urls_per_file = max;
        }
        if let Some(priority) = self.priority {
            cfg.priority = priority;
        }
        if let Some(prefix) = self.prefix {
            cfg.filename_prefix = prefix;
        }
        if self.gzip {
            cfg.gzip = true;
        }
        if self.base_url.is_some() {
            cfg.base_url = self.base_url;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(logging::default_filter(cli.verbose));

    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Generate {
            params,
            dry_run,
            json,
            progress,
        } => {
            params.apply(&mut cfg);
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = progress.reporter();
            let report = generate::run(&cfg, dry_run, reporter.as_ref())
                .with_context(|| {
                    format!("sitemap generation from {} failed", cfg.source.display())
                })?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.render());
            }
        }
        Commands::Check { params, json } => {
            params.apply(&mut cfg);
            let report = generate::run(&cfg, true, &NoProgress)
                .with_context(|| format!("checking {} failed", cfg.source.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.selectors)?);
            } else {
                for s in &report.selectors {
                    println!("{}\t{}", s.count, s.selector);
                }
            }
        }
    }

    Ok(())
}
