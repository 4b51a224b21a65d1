//! Sitemap generation run.
//!
//! Drives the pipeline end to end:
//!
//! ```text
//! validate config ─▶ compile selectors ─▶ parse source
//!        │
//!        ▼
//! loop { next batch ─▶ build sitemap ─▶ write file ─▶ record index entry }
//!        │
//!        ▼
//! write sitemap index (only for 2+ files)
//! ```
//!
//! The loop ends when a batch comes back empty, which only happens once the
//! extraction sequence is exhausted. Any error aborts the run at once; files
//! already written stay on disk.

use std::path::Path;
use tracing::{debug, info};

use crate::batch::BatchPartitioner;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{DirectorySink, DryRunSink, SitemapSink, SitemapWriter};
use crate::extract::Extraction;
use crate::index::IndexAccumulator;
use crate::models::Priority;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::selector::SelectorSet;
use crate::sitemap::SitemapDocument;
use crate::source::SourceDocument;
use crate::stats::{RunReport, WrittenFile};

/// Run a generation. With `dry_run` nothing is written; the report lists the
/// files that would have been.
pub fn run(config: &Config, dry_run: bool, progress: &dyn ProgressReporter) -> Result<RunReport> {
    config.validate()?;
    let priority = Priority::new(config.priority).ok_or_else(|| {
        Error::InvalidConfig(format!("priority out of range: {}", config.priority))
    })?;
    let selectors = SelectorSet::compile(&config.selectors, config.context.as_deref())?;
    let doc = SourceDocument::open(&config.source)?;

    let report = RunReport {
        dry_run,
        ..RunReport::default()
    };
    if dry_run {
        let sink = DryRunSink::new(&config.output_dir);
        generate(config, &doc, &selectors, priority, sink, report, progress)
    } else {
        let sink = DirectorySink::create(&config.output_dir)?;
        generate(config, &doc, &selectors, priority, sink, report, progress)
    }
}

fn generate<S: SitemapSink>(
    config: &Config,
    doc: &SourceDocument,
    selectors: &SelectorSet,
    priority: Priority,
    sink: S,
    mut report: RunReport,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let sequences = selectors.resolve(doc, &mut report);
    let mut batches = BatchPartitioner::new(
        Extraction::new(doc, sequences),
        config.max_urls_per_file,
        priority,
    );
    let mut writer = SitemapWriter::new(sink, &config.filename_prefix, config.gzip);
    let mut index = IndexAccumulator::new();

    loop {
        let Some(document) = SitemapDocument::build(batches.next_batch(&mut report)) else {
            break;
        };
        let file = writer.write(&document)?;
        index.record(index_loc(config.base_url.as_deref(), &file));
        progress.report(ProgressEvent::FileWritten {
            path: file.path.clone(),
            file_number: writer.written(),
            urls: file.urls,
            total_urls: report.total_urls(),
        });
        report.record_file(file);
    }
    debug!(dropped = batches.dropped(), "extraction exhausted");

    let index_path = writer.sink().dir().join(&config.index_filename);
    let bytes = index.finish().map_err(|e| Error::output(&index_path, e))?;
    match bytes {
        Some(bytes) => {
            let path = writer.write_index(&config.index_filename, &bytes)?;
            report.record_index(path);
        }
        None => debug!(files = index.len(), "sitemap index not needed"),
    }

    info!(
        files = report.files_written(),
        urls = report.total_urls(),
        index = report.index_written(),
        "generation finished"
    );
    progress.report(ProgressEvent::Finished {
        files: report.files_written(),
        total_urls: report.total_urls(),
        index: report.index.clone(),
    });
    Ok(report)
}

/// `<loc>` of a sitemap inside the index: under `base_url` when one is
/// configured, else the written path.
fn index_loc(base_url: Option<&str>, file: &WrittenFile) -> String {
    match base_url {
        Some(base) => {
            let name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            format!("{}/{}", base.trim_end_matches('/'), name)
        }
        None => path_loc(&file.path),
    }
}

fn path_loc(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use std::path::PathBuf;

    fn feed(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("feed.xml");
        let feed = format!("<yml_catalog><shop><offers>{}</offers></shop></yml_catalog>", body);
        fs::write(&path, feed).unwrap();
        path
    }

    fn offers(locs: &[&str]) -> String {
        locs.iter()
            .map(|l| format!("<offer><url>{}</url></offer>", l))
            .collect()
    }

    #[test]
    fn index_loc_prefers_base_url() {
        let file = WrittenFile {
            path: PathBuf::from("out/sitemap1.xml"),
            gzip_path: None,
            urls: 1,
        };
        assert_eq!(
            index_loc(Some("https://shop.example/maps/"), &file),
            "https://shop.example/maps/sitemap1.xml"
        );
        assert_eq!(index_loc(None, &file), path_loc(Path::new("out/sitemap1.xml")));
    }

    #[test]
    fn single_file_has_no_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let config = Config {
            source: feed(tmp.path(), &offers(&["https://a/1", "", "https://a/2"])),
            output_dir: out.clone(),
            max_urls_per_file: 2,
            ..Config::default()
        };
        let report = run(&config, false, &NoProgress).unwrap();
        assert_eq!(report.files_written(), 1);
        assert_eq!(report.count("//offer/url"), Some(2));
        assert!(!report.index_written());
        assert!(out.join("sitemap.xml").exists());
        assert!(!out.join("sitemap1.xml").exists());
        assert!(!out.join("sitemap-index.xml").exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let config = Config {
            source: feed(tmp.path(), &offers(&["https://a/1", "https://a/2", "https://a/3"])),
            output_dir: out.clone(),
            max_urls_per_file: 2,
            ..Config::default()
        };
        let report = run(&config, true, &NoProgress).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.files_written(), 2);
        assert_eq!(report.index, Some(out.join("sitemap-index.xml")));
        assert!(!out.exists());
    }

    #[test]
    fn no_matches_writes_no_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let config = Config {
            source: feed(tmp.path(), ""),
            output_dir: out.clone(),
            ..Config::default()
        };
        let report = run(&config, false, &NoProgress).unwrap();
        assert_eq!(report.files_written(), 0);
        assert_eq!(report.count("//offer/url"), Some(0));
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn selector_error_precedes_parsing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            source: tmp.path().join("missing.xml"),
            output_dir: tmp.path().join("out"),
            selectors: vec!["//offer[".to_string()],
            ..Config::default()
        };
        let err = run(&config, false, &NoProgress).unwrap_err();
        assert!(matches!(err, Error::SelectorSyntax { .. }));
    }

    #[test]
    fn malformed_source_produces_no_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("feed.xml");
        fs::write(&source, "<offers><offer><url>x</url></offers>").unwrap();
        let out = tmp.path().join("out");
        let config = Config {
            source,
            output_dir: out.clone(),
            ..Config::default()
        };
        let err = run(&config, false, &NoProgress).unwrap_err();
        assert!(matches!(err, Error::SourceMalformed { .. }));
        assert!(!out.exists());
    }
}
