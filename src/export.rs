//! Writing sitemap and index files.
//!
//! File names are deterministic: the first sitemap is `{prefix}.xml`, the
//! following ones `{prefix}1.xml`, `{prefix}2.xml`, and so on. Consumers of
//! existing sitemap indexes rely on this numbering.
//!
//! With gzip enabled each sitemap also gets a `.xml.gz` sibling compressed
//! from the very bytes written to the `.xml` file, so decompressing it gives
//! the same content byte for byte.
//!
//! The actual persistence goes through a [`SitemapSink`]: [`DirectorySink`]
//! writes to disk, [`DryRunSink`] only reports where files would go.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sitemap::SitemapDocument;
use crate::stats::WrittenFile;

/// Destination for serialized output files.
pub trait SitemapSink {
    /// Directory the files land in.
    fn dir(&self) -> &Path;

    /// Store `bytes` as `file_name`, plus a gzip sibling when `compress` is
    /// set. Returns the path of the plain file and of the sibling.
    fn put(&mut self, file_name: &str, bytes: &[u8], compress: bool)
        -> Result<(PathBuf, Option<PathBuf>)>;
}

/// Writes into a directory on disk, creating it (and its parents) first.
/// Existing files are overwritten; nothing else in the directory is touched.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::output(dir, e))?;
        debug!(dir = %dir.display(), "output directory ready");
        Ok(DirectorySink {
            dir: dir.to_path_buf(),
        })
    }
}

impl SitemapSink for DirectorySink {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn put(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        compress: bool,
    ) -> Result<(PathBuf, Option<PathBuf>)> {
        let path = self.dir.join(file_name);
        write_plain(&path, bytes).map_err(|e| Error::output(&path, e))?;

        let gzip_path = if compress {
            let gz = gzip_sibling(&path);
            write_gzip(&gz, bytes).map_err(|e| Error::output(&gz, e))?;
            Some(gz)
        } else {
            None
        };
        Ok((path, gzip_path))
    }
}

fn write_plain(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(bytes)?;
    out.flush()
}

fn write_gzip(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()?.flush()
}

/// Computes paths without touching the filesystem.
#[derive(Debug)]
pub struct DryRunSink {
    dir: PathBuf,
}

impl DryRunSink {
    pub fn new(dir: &Path) -> Self {
        DryRunSink {
            dir: dir.to_path_buf(),
        }
    }
}

impl SitemapSink for DryRunSink {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn put(
        &mut self,
        file_name: &str,
        _bytes: &[u8],
        compress: bool,
    ) -> Result<(PathBuf, Option<PathBuf>)> {
        let path = self.dir.join(file_name);
        let gzip_path = compress.then(|| gzip_sibling(&path));
        Ok((path, gzip_path))
    }
}

/// `{prefix}.xml` for index 0, `{prefix}{index}.xml` afterwards.
pub fn sitemap_file_name(prefix: &str, index: usize) -> String {
    if index == 0 {
        format!("{}.xml", prefix)
    } else {
        format!("{}{}.xml", prefix, index)
    }
}

fn gzip_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Serializes sitemap documents and hands them to a sink with sequential
/// file names.
pub struct SitemapWriter<S> {
    sink: S,
    prefix: String,
    gzip: bool,
    next_index: usize,
}

impl<S: SitemapSink> SitemapWriter<S> {
    pub fn new(sink: S, prefix: &str, gzip: bool) -> Self {
        SitemapWriter {
            sink,
            prefix: prefix.to_string(),
            gzip,
            next_index: 0,
        }
    }

    /// Write `document` under the next file name.
    pub fn write(&mut self, document: &SitemapDocument) -> Result<WrittenFile> {
        let file_name = sitemap_file_name(&self.prefix, self.next_index);
        let bytes = document
            .to_xml()
            .map_err(|e| Error::output(self.sink.dir().join(&file_name), e))?;
        let (path, gzip_path) = self.sink.put(&file_name, &bytes, self.gzip)?;
        self.next_index += 1;

        info!(path = %path.display(), urls = document.len(), "wrote sitemap");
        Ok(WrittenFile {
            path,
            gzip_path,
            urls: document.len(),
        })
    }

    /// Write an already serialized index document. Never compressed.
    pub fn write_index(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let (path, _) = self.sink.put(file_name, bytes, false)?;
        info!(path = %path.display(), "wrote sitemap index");
        Ok(path)
    }

    /// Number of sitemap files written so far.
    pub fn written(&self) -> usize {
        self.next_index
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddressEntry, Priority};
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn document(locs: &[&str]) -> SitemapDocument {
        SitemapDocument::build(
            locs.iter()
                .map(|l| AddressEntry {
                    loc: l.to_string(),
                    priority: Priority::DEFAULT,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn file_names_are_sequential() {
        assert_eq!(sitemap_file_name("sitemap", 0), "sitemap.xml");
        assert_eq!(sitemap_file_name("sitemap", 1), "sitemap1.xml");
        assert_eq!(sitemap_file_name("offers", 12), "offers12.xml");
    }

    #[test]
    fn directory_sink_creates_nested_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        let mut writer = SitemapWriter::new(DirectorySink::create(&dir).unwrap(), "sitemap", false);

        let first = writer.write(&document(&["https://a/1"])).unwrap();
        let second = writer.write(&document(&["https://a/2"])).unwrap();
        assert_eq!(first.path, dir.join("sitemap.xml"));
        assert_eq!(second.path, dir.join("sitemap1.xml"));
        assert!(first.gzip_path.is_none());
        assert!(first.path.exists() && second.path.exists());
        assert_eq!(writer.written(), 2);
    }

    #[test]
    fn gzip_sibling_matches_plain_bytes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut writer =
            SitemapWriter::new(DirectorySink::create(tmp.path()).unwrap(), "sitemap", true);
        let file = writer.write(&document(&["https://a/1", "https://a/2"])).unwrap();

        let gz = file.gzip_path.unwrap();
        assert_eq!(gz, tmp.path().join("sitemap.xml.gz"));
        let plain = fs::read(&file.path).unwrap();
        let mut decoded = Vec::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(plain, decoded);
    }

    #[test]
    fn dry_run_sink_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("never");
        let mut writer = SitemapWriter::new(DryRunSink::new(&dir), "sitemap", true);
        let file = writer.write(&document(&["https://a/1"])).unwrap();
        assert_eq!(file.path, dir.join("sitemap.xml"));
        assert_eq!(file.gzip_path, Some(dir.join("sitemap.xml.gz")));
        assert!(!dir.exists());
    }

    #[test]
    fn unwritable_directory_is_output_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let err = DirectorySink::create(&blocker.join("sub")).unwrap_err();
        assert!(matches!(err, Error::OutputWrite { .. }));
    }
}
