//! Generation progress reporting.
//!
//! Reports each sitemap file as it is written and a summary once the run
//! ends, so large feeds show signs of life. Progress is emitted on **stderr**
//! so stdout remains parseable for scripts.

use std::io::Write;
use std::path::PathBuf;

/// A single progress event for a generation run.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A sitemap file was written (or planned, in a dry run).
    FileWritten {
        path: PathBuf,
        file_number: usize,
        urls: usize,
        total_urls: u64,
    },
    /// The run is over.
    Finished {
        files: usize,
        total_urls: u64,
        index: Option<PathBuf>,
    },
}

/// Reports generation progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter {
    /// Emit a progress event. Called from the orchestrator loop.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "sitemap 2  out/sitemap1.xml  50,000 urls (100,000 total)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::FileWritten {
                path,
                file_number,
                urls,
                total_urls,
            } => format!(
                "sitemap {}  {}  {} urls ({} total)\n",
                file_number,
                path.display(),
                format_number(*urls as u64),
                format_number(*total_urls)
            ),
            ProgressEvent::Finished {
                files,
                total_urls,
                index,
            } => {
                let index = match index {
                    Some(path) => format!(", index {}", path.display()),
                    None => String::new(),
                };
                format!(
                    "done  {} file(s), {} urls{}\n",
                    files,
                    format_number(*total_urls),
                    index
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::FileWritten {
                path,
                file_number,
                urls,
                total_urls,
            } => serde_json::json!({
                "event": "file_written",
                "path": path,
                "file_number": file_number,
                "urls": urls,
                "total_urls": total_urls
            }),
            ProgressEvent::Finished {
                files,
                total_urls,
                index,
            } => serde_json::json!({
                "event": "finished",
                "files": files,
                "total_urls": total_urls,
                "index": index
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(50_000), "50,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    struct Recorder(RefCell<Vec<String>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            let tag = match event {
                ProgressEvent::FileWritten { file_number, .. } => format!("file {}", file_number),
                ProgressEvent::Finished { files, .. } => format!("finished {}", files),
            };
            self.0.borrow_mut().push(tag);
        }
    }

    #[test]
    fn reporters_are_object_safe() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        let reporter: &dyn ProgressReporter = &recorder;
        reporter.report(ProgressEvent::FileWritten {
            path: PathBuf::from("sitemap.xml"),
            file_number: 1,
            urls: 3,
            total_urls: 3,
        });
        reporter.report(ProgressEvent::Finished {
            files: 1,
            total_urls: 3,
            index: None,
        });
        assert_eq!(*recorder.0.borrow(), vec!["file 1", "finished 1"]);
    }
}
