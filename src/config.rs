//! Generation parameters.
//!
//! A [`Config`] is the parameter bundle the pipeline consumes. It can be
//! read from a TOML file with [`load_config`] and then overridden field by
//! field from the command line. [`Config::validate`] runs before any input is
//! opened, so an unsafe filename prefix never costs a parse.
//!
//! ```toml
//! source = "feeds/offers.xml.gz"
//! output_dir = "public/sitemaps"
//! selectors = ["//offer/url"]
//! max_urls_per_file = 50000
//! priority = 0.3
//! filename_prefix = "sitemap"
//! gzip = true
//! base_url = "https://shop.example"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Protocol limit on `<url>` entries per sitemap file.
pub const MAX_URLS_PER_FILE: usize = 50_000;

/// Characters that cannot appear in an output filename prefix.
const HOSTILE_PREFIX_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Input feed, plain or gzip-compressed XML.
    #[serde(default)]
    pub source: PathBuf,
    /// Directory receiving sitemap files. Created if absent, never cleared.
    #[serde(default)]
    pub output_dir: PathBuf,
    /// Selector expressions, applied in order.
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,
    /// Optional sub-root selector for relative selectors.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_max_urls_per_file")]
    pub max_urls_per_file: usize,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
    /// Also write a `.xml.gz` sibling for every sitemap file.
    #[serde(default)]
    pub gzip: bool,
    /// Public URL of the output directory, used for index `<loc>` values.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_index_filename")]
    pub index_filename: String,
}

fn default_selectors() -> Vec<String> {
    vec!["//offer/url".to_string()]
}
fn default_max_urls_per_file() -> usize {
    MAX_URLS_PER_FILE
}
fn default_priority() -> f64 {
    0.3
}
fn default_filename_prefix() -> String {
    "sitemap".to_string()
}
fn default_index_filename() -> String {
    "sitemap-index.xml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            output_dir: PathBuf::new(),
            selectors: default_selectors(),
            context: None,
            max_urls_per_file: default_max_urls_per_file(),
            priority: default_priority(),
            filename_prefix: default_filename_prefix(),
            gzip: false,
            base_url: None,
            index_filename: default_index_filename(),
        }
    }
}

impl Config {
    /// Check every parameter. Touches neither the source nor the output dir.
    pub fn validate(&self) -> Result<(), Error> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("source path is required".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "output directory is required".to_string(),
            ));
        }
        if self.selectors.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one selector is required".to_string(),
            ));
        }
        if let Some(blank) = self.selectors.iter().find(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "selector must not be blank: '{}'",
                blank
            )));
        }
        if !(1..=MAX_URLS_PER_FILE).contains(&self.max_urls_per_file) {
            return Err(Error::InvalidConfig(format!(
                "max_urls_per_file must be in [1, {}], got {}",
                MAX_URLS_PER_FILE, self.max_urls_per_file
            )));
        }
        if !self.priority.is_finite() || !(0.0..=1.0).contains(&self.priority) {
            return Err(Error::InvalidConfig(format!(
                "priority must be in [0.0, 1.0], got {}",
                self.priority
            )));
        }
        validate_file_component("filename_prefix", &self.filename_prefix)?;
        validate_file_component("index_filename", &self.index_filename)?;
        if is_sitemap_name(&self.filename_prefix, &self.index_filename) {
            return Err(Error::InvalidConfig(format!(
                "index_filename '{}' would be overwritten by a sitemap file",
                self.index_filename
            )));
        }
        if let Some(base) = &self.base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "base_url must start with http:// or https://, got '{}'",
                    base
                )));
            }
        }
        Ok(())
    }
}

/// Rejects names that would escape the output directory or that common
/// filesystems refuse.
fn validate_file_component(field: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(Error::InvalidConfig(format!(
            "{} must be a plain file name, got '{}'",
            field, value
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| HOSTILE_PREFIX_CHARS.contains(c) || c.is_control())
    {
        return Err(Error::InvalidConfig(format!(
            "{} contains forbidden character {:?}: '{}'",
            field, c, value
        )));
    }
    Ok(())
}

/// True if `name` is `{prefix}.xml` or `{prefix}{N}.xml`.
fn is_sitemap_name(prefix: &str, name: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            source: PathBuf::from("offers.xml"),
            output_dir: PathBuf::from("out"),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_validate() {
        let cfg = valid();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_urls_per_file, 50_000);
        assert_eq!(cfg.filename_prefix, "sitemap");
        assert_eq!(cfg.selectors, vec!["//offer/url".to_string()]);
    }

    #[test]
    fn prefix_with_separator_is_rejected() {
        for prefix in ["../evil", "a/b", "a\\b", "c:map", "map?", "", "..", "tab\there"] {
            let cfg = Config {
                filename_prefix: prefix.to_string(),
                ..valid()
            };
            let err = cfg.validate().unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfig(_)),
                "prefix {:?} accepted",
                prefix
            );
        }
    }

    #[test]
    fn max_urls_bounds() {
        let zero = Config {
            max_urls_per_file: 0,
            ..valid()
        };
        assert!(zero.validate().is_err());
        let over = Config {
            max_urls_per_file: 50_001,
            ..valid()
        };
        assert!(over.validate().is_err());
        let one = Config {
            max_urls_per_file: 1,
            ..valid()
        };
        assert!(one.validate().is_ok());
    }

    #[test]
    fn priority_bounds() {
        for p in [-0.1, 1.5, f64::NAN] {
            let cfg = Config {
                priority: p,
                ..valid()
            };
            assert!(cfg.validate().is_err(), "priority {} accepted", p);
        }
        let edge = Config {
            priority: 1.0,
            ..valid()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn base_url_scheme_checked() {
        let cfg = Config {
            base_url: Some("ftp://host".to_string()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn index_name_must_not_collide_with_sitemaps() {
        for index in ["sitemap.xml", "sitemap3.xml"] {
            let cfg = Config {
                index_filename: index.to_string(),
                ..valid()
            };
            assert!(cfg.validate().is_err(), "index {} accepted", index);
        }
        let cfg = Config {
            index_filename: "sitemap_index.xml".to_string(),
            ..valid()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
source = "feed.xml"
output_dir = "out"
selectors = ["//offer/url", "//category/@href"]
gzip = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.selectors.len(), 2);
        assert!(cfg.gzip);
        assert_eq!(cfg.priority, 0.3);
        assert_eq!(cfg.index_filename, "sitemap-index.xml");
        assert!(cfg.validate().is_ok());
    }
}
