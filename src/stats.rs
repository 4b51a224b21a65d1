//! Run report: per-selector tallies and the files a run produced.
//!
//! A single [`RunReport`] is owned by the orchestrator and lent mutably to the
//! stages that update it. It is printed at the end of `sitemap-gen generate`
//! as a table on stdout, or as one JSON document with `--json`.

use serde::Serialize;
use std::path::PathBuf;

/// Non-empty addresses produced by one selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorCount {
    pub selector: String,
    pub count: u64,
}

/// One sitemap file written (or planned, in a dry run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gzip_path: Option<PathBuf>,
    pub urls: usize,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Counts in selector configuration order. Identical expressions share
    /// one entry.
    pub selectors: Vec<SelectorCount>,
    pub files: Vec<WrittenFile>,
    pub index: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunReport {
    /// Start a zero tally for `selector` unless it already has one.
    pub fn register_selector(&mut self, selector: &str) {
        if self.position(selector).is_none() {
            self.selectors.push(SelectorCount {
                selector: selector.to_string(),
                count: 0,
            });
        }
    }

    /// Count one address for `selector`.
    pub fn record_address(&mut self, selector: &str) {
        match self.position(selector) {
            Some(i) => self.selectors[i].count += 1,
            None => self.selectors.push(SelectorCount {
                selector: selector.to_string(),
                count: 1,
            }),
        }
    }

    pub fn record_file(&mut self, file: WrittenFile) {
        self.files.push(file);
    }

    pub fn record_index(&mut self, path: PathBuf) {
        self.index = Some(path);
    }

    pub fn count(&self, selector: &str) -> Option<u64> {
        self.position(selector).map(|i| self.selectors[i].count)
    }

    pub fn total_urls(&self) -> u64 {
        self.selectors.iter().map(|s| s.count).sum()
    }

    pub fn files_written(&self) -> usize {
        self.files.len()
    }

    pub fn index_written(&self) -> bool {
        self.index.is_some()
    }

    fn position(&self, selector: &str) -> Option<usize> {
        self.selectors.iter().position(|s| s.selector == selector)
    }

    /// Human-readable summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let width = self
            .selectors
            .iter()
            .map(|s| s.selector.len())
            .max()
            .unwrap_or(0)
            .max("SELECTOR".len());

        out.push_str(&format!("  {:<width$}  {:>10}\n", "SELECTOR", "URLS"));
        out.push_str(&format!("  {}\n", "-".repeat(width + 12)));
        for s in &self.selectors {
            out.push_str(&format!("  {:<width$}  {:>10}\n", s.selector, s.count));
        }
        out.push('\n');

        let verb = if self.dry_run { "would write" } else { "wrote" };
        out.push_str(&format!(
            "  {} {} sitemap file(s), {} url(s)\n",
            verb,
            self.files.len(),
            self.total_urls()
        ));
        for f in &self.files {
            out.push_str(&format!("    {}  ({} urls)\n", f.path.display(), f.urls));
            if let Some(gz) = &f.gzip_path {
                out.push_str(&format!("    {}\n", gz.display()));
            }
        }
        match &self.index {
            Some(path) => out.push_str(&format!("  index: {}\n", path.display())),
            None => out.push_str("  index: not needed\n"),
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_keep_registration_order() {
        let mut report = RunReport::default();
        report.register_selector("//offer/url");
        report.register_selector("//category/@href");
        report.record_address("//category/@href");
        report.record_address("//offer/url");
        report.record_address("//offer/url");
        report.register_selector("//offer/url");

        let keys: Vec<&str> = report.selectors.iter().map(|s| s.selector.as_str()).collect();
        assert_eq!(keys, vec!["//offer/url", "//category/@href"]);
        assert_eq!(report.count("//offer/url"), Some(2));
        assert_eq!(report.count("//category/@href"), Some(1));
        assert_eq!(report.count("//missing"), None);
        assert_eq!(report.total_urls(), 3);
    }

    #[test]
    fn render_mentions_files_and_index() {
        let mut report = RunReport::default();
        report.register_selector("//offer/url");
        report.record_address("//offer/url");
        report.record_file(WrittenFile {
            path: PathBuf::from("out/sitemap.xml"),
            gzip_path: None,
            urls: 1,
        });
        let text = report.render();
        assert!(text.contains("//offer/url"));
        assert!(text.contains("wrote 1 sitemap file(s), 1 url(s)"));
        assert!(text.contains("index: not needed"));
    }

    #[test]
    fn json_shape() {
        let mut report = RunReport::default();
        report.register_selector("//u");
        report.record_index(PathBuf::from("out/sitemap-index.xml"));
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["selectors"][0]["selector"], "//u");
        assert_eq!(value["selectors"][0]["count"], 0);
        assert_eq!(value["index"], "out/sitemap-index.xml");
        assert_eq!(value["dry_run"], false);
    }
}
